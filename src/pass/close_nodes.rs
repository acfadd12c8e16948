use crate::data::{OsmId, Way};
use crate::errors::Result;
use crate::id_set::{IdCollector, IdSet};
use crate::parse::OsmHandler;

use super::Pass;

pub const PASS_NAME: &str = "close_nodes";

/// Adds the member nodes of every interesting way. Needs the finished way set, so it can
/// only run once discovery is complete.
pub struct CloseNodesPass<'a> {
    ways: &'a IdSet<OsmId>,
    nodes: IdCollector<OsmId>,
}

impl<'a> CloseNodesPass<'a> {
    pub fn new(ways: &'a IdSet<OsmId>, nodes: IdCollector<OsmId>) -> Self {
        CloseNodesPass { ways, nodes }
    }

    pub fn finish(self) -> IdSet<OsmId> {
        self.nodes.freeze()
    }
}

impl OsmHandler for CloseNodesPass<'_> {
    fn way(&mut self, way: &Way) -> Result<()> {
        if self.ways.contains(way.id) {
            self.nodes.extend(way.nodes.iter().copied());
        }
        Ok(())
    }
}

impl Pass for CloseNodesPass<'_> {
    fn pass_name(&self) -> &str {
        PASS_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Node, Tag};

    #[test]
    fn adds_nodes_of_interesting_ways_only() {
        let ways = [10u64, 30].into_iter().collect::<IdCollector<_>>().freeze();
        let discovered = [7u64, 2].into_iter().collect::<IdCollector<_>>().freeze();
        let mut pass = CloseNodesPass::new(&ways, discovered.into_collector());

        pass.way(&Way { id: 10, nodes: vec![3, 1, 2, 3], tags: Vec::new() }).unwrap();
        pass.way(&Way { id: 20, nodes: vec![50, 51], tags: vec![Tag::new("railway", "rail")] }).unwrap();
        pass.node(&Node { id: 99, tags: vec![Tag::new("railway", "station")], ..Node::default() }).unwrap();

        let nodes = pass.finish();
        assert_eq!(nodes.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 7]);
    }
}
