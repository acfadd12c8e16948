use std::io::Write;

use crate::data::{ElementCounts, ElementKind, Node, Relation, Way};
use crate::errors::Result;
use crate::parse::OsmHandler;
use crate::selection::Selection;
use crate::xml::OsmXmlWriter;

use super::Pass;

pub const PASS_NAME: &str = "emit";

/// Writes every selected element, in input order.
pub struct EmitPass<'a, W: Write> {
    selection: &'a Selection,
    writer: OsmXmlWriter<W>,
    emitted: ElementCounts,
}

impl<'a, W: Write> EmitPass<'a, W> {
    pub fn new(selection: &'a Selection, writer: OsmXmlWriter<W>) -> Self {
        EmitPass {
            selection,
            writer,
            emitted: ElementCounts::default(),
        }
    }

    pub fn finish(self) -> Result<(W, ElementCounts)> {
        let out = self.writer.finish()?;
        Ok((out, self.emitted))
    }
}

impl<W: Write> OsmHandler for EmitPass<'_, W> {
    fn node(&mut self, node: &Node) -> Result<()> {
        if self.selection.contains(ElementKind::Node, node.id) {
            self.writer.write_node(node)?;
            self.emitted.bump(ElementKind::Node);
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        if self.selection.contains(ElementKind::Way, way.id) {
            self.writer.write_way(way)?;
            self.emitted.bump(ElementKind::Way);
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        if self.selection.contains(ElementKind::Relation, relation.id) {
            self.writer.write_relation(relation)?;
            self.emitted.bump(ElementKind::Relation);
        }
        Ok(())
    }
}

impl<W: Write> Pass for EmitPass<'_, W> {
    fn pass_name(&self) -> &str {
        PASS_NAME
    }
}
