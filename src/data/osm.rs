/// Element ids are 64 bit in current OSM data.
pub type OsmId = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Way {
    pub id: OsmId,
    /// Member node ids in path order.
    pub nodes: Vec<OsmId>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Member {
    pub id: OsmId,
    pub role: String,
}

impl Member {
    pub fn new(id: OsmId, role: impl Into<String>) -> Self {
        Member {
            id,
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relation {
    pub id: OsmId,
    pub nodes: Vec<Member>,
    pub ways: Vec<Member>,
    pub tags: Vec<Tag>,
}
