pub mod osm;

pub use self::osm::{Member, Node, OsmId, Relation, Tag, Way};

/// Which of the three OSM element kinds a record or id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

/// Per-kind counters, used for set sizes and emission statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ElementCounts {
    pub nodes: usize,
    pub ways: usize,
    pub relations: usize,
}

impl ElementCounts {
    pub fn bump(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Node => self.nodes += 1,
            ElementKind::Way => self.ways += 1,
            ElementKind::Relation => self.relations += 1,
        }
    }
}
