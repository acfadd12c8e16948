use crate::data::{Node, OsmId, Relation, Way};
use crate::errors::Result;
use crate::filter::TagFilter;
use crate::id_set::{IdCollector, IdSet};
use crate::parse::OsmHandler;

use super::Pass;

pub const PASS_NAME: &str = "discover";

/// Output of the first pass. Ways and relations are complete; nodes are reopened and grow in
/// the second pass.
pub struct Discovered {
    pub nodes: IdSet<OsmId>,
    pub ways: IdSet<OsmId>,
    pub relations: IdSet<OsmId>,
}

/// Collects directly matching elements and every member of a matching relation.
pub struct DiscoverPass<'a> {
    filter: &'a TagFilter,
    nodes: IdCollector<OsmId>,
    ways: IdCollector<OsmId>,
    relations: IdCollector<OsmId>,
}

impl<'a> DiscoverPass<'a> {
    pub fn new(filter: &'a TagFilter) -> Self {
        DiscoverPass {
            filter,
            nodes: IdCollector::new(),
            ways: IdCollector::new(),
            relations: IdCollector::new(),
        }
    }

    pub fn finish(self) -> Discovered {
        Discovered {
            nodes: self.nodes.freeze(),
            ways: self.ways.freeze(),
            relations: self.relations.freeze(),
        }
    }
}

impl OsmHandler for DiscoverPass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        if self.filter.matches(&node.tags) {
            self.nodes.push(node.id);
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        if self.filter.matches(&way.tags) {
            self.ways.push(way.id);
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        if !self.filter.matches(&relation.tags) {
            return Ok(());
        }
        self.relations.push(relation.id);
        // Members are needed whatever their own tags say.
        self.ways.extend(relation.ways.iter().map(|member| member.id));
        self.nodes.extend(relation.nodes.iter().map(|member| member.id));
        Ok(())
    }
}

impl Pass for DiscoverPass<'_> {
    fn pass_name(&self) -> &str {
        PASS_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Member, Tag};

    #[test]
    fn relation_members_are_collected_regardless_of_tags() {
        let filter = TagFilter::railway();
        let mut pass = DiscoverPass::new(&filter);

        pass.node(&Node { id: 1, tags: vec![Tag::new("railway", "station")], ..Node::default() }).unwrap();
        pass.node(&Node { id: 2, tags: vec![Tag::new("amenity", "cafe")], ..Node::default() }).unwrap();
        pass.way(&Way { id: 20, nodes: vec![1, 2], tags: vec![Tag::new("railway", "rail")] }).unwrap();
        pass.way(&Way { id: 10, nodes: vec![3], tags: vec![Tag::new("highway", "residential")] }).unwrap();
        pass.relation(&Relation {
            id: 100,
            nodes: vec![Member::new(2, "stop")],
            ways: vec![Member::new(10, ""), Member::new(20, "")],
            tags: vec![Tag::new("route", "train")],
        })
        .unwrap();
        pass.relation(&Relation {
            id: 200,
            nodes: vec![Member::new(9, "stop")],
            ways: vec![Member::new(30, "")],
            tags: vec![Tag::new("route", "bus")],
        })
        .unwrap();

        let discovered = pass.finish();
        assert_eq!(discovered.ways.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
        assert_eq!(discovered.relations.iter().copied().collect::<Vec<_>>(), vec![100]);
        assert_eq!(discovered.nodes.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn way_members_are_not_collected_in_discovery() {
        let filter = TagFilter::railway();
        let mut pass = DiscoverPass::new(&filter);
        pass.way(&Way { id: 20, nodes: vec![1, 2], tags: vec![Tag::new("railway", "rail")] }).unwrap();
        let discovered = pass.finish();
        assert!(discovered.nodes.is_empty());
        assert!(discovered.ways.contains(20));
    }
}
