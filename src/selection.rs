//! The three pass selection.
//!
//! 1. `discover`: ids of matching elements plus all members of matching relations.
//!    Ways and relations are final afterwards.
//! 2. `close_nodes`: member nodes of every interesting way. Nodes are final afterwards.
//! 3. `emit`: every element whose id is in its set is written out.
//!
//! Only ids are held between passes. Relations that are members of other relations are
//! not followed.

use std::io::Write;
use std::path::Path;

use log::info;

use crate::config::UserConfig;
use crate::data::{ElementCounts, ElementKind, OsmId};
use crate::errors::Result;
use crate::filter::TagFilter;
use crate::id_set::IdSet;
use crate::pass::close_nodes::CloseNodesPass;
use crate::pass::discover::{DiscoverPass, Discovered};
use crate::pass::emit::EmitPass;
use crate::pass::{Pass, ScanStats};
use crate::xml::OsmXmlWriter;

/// Final ids of interest, one frozen set per element kind.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    pub nodes: IdSet<OsmId>,
    pub ways: IdSet<OsmId>,
    pub relations: IdSet<OsmId>,
}

impl Selection {
    pub fn contains(&self, kind: ElementKind, id: OsmId) -> bool {
        match kind {
            ElementKind::Node => self.nodes.contains(id),
            ElementKind::Way => self.ways.contains(id),
            ElementKind::Relation => self.relations.contains(id),
        }
    }

    pub fn counts(&self) -> ElementCounts {
        ElementCounts {
            nodes: self.nodes.len(),
            ways: self.ways.len(),
            relations: self.relations.len(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub selected: ElementCounts,
    pub emitted: ElementCounts,
    pub scans: ScanStats,
}

/// Runs the discovery and node closure passes.
pub fn select(path: &Path, filter: &TagFilter, buffer_size: usize, scans: &mut ScanStats) -> Result<Selection> {
    let mut discover = DiscoverPass::new(filter);
    scans.absorb(discover.process(path, buffer_size)?);
    let Discovered { nodes, ways, relations } = discover.finish();
    info!(ways = ways.len(), relations = relations.len(), nodes_so_far = nodes.len(); "Ways and relations of interest are final");

    let mut close_nodes = CloseNodesPass::new(&ways, nodes.into_collector());
    scans.absorb(close_nodes.process(path, buffer_size)?);
    let nodes = close_nodes.finish();

    let selection = Selection { nodes, ways, relations };
    let counts = selection.counts();
    info!(nodes = counts.nodes, ways = counts.ways, relations = counts.relations; "Elements of interest");
    Ok(selection)
}

/// Runs the emission pass, writing a complete document to `out`.
pub fn emit<W: Write>(
    path: &Path,
    selection: &Selection,
    buffer_size: usize,
    generator: &str,
    out: W,
    scans: &mut ScanStats,
) -> Result<(W, ElementCounts)> {
    let writer = OsmXmlWriter::start(out, generator)?;
    let mut pass = EmitPass::new(selection, writer);
    scans.absorb(pass.process(path, buffer_size)?);
    let (out, emitted) = pass.finish()?;
    info!(nodes = emitted.nodes, ways = emitted.ways, relations = emitted.relations; "Elements written");
    Ok((out, emitted))
}

/// Filters the file at `path` into `out`.
pub fn run<W: Write>(path: &Path, config: &UserConfig, out: W) -> Result<(W, Summary)> {
    config.validate()?;
    let filter = config.tag_filter()?;
    let mut scans = ScanStats::default();

    let selection = select(path, &filter, config.buffer_size, &mut scans)?;
    let (out, emitted) = emit(path, &selection, config.buffer_size, &config.generator, out, &mut scans)?;

    Ok((
        out,
        Summary {
            selected: selection.counts(),
            emitted,
            scans,
        },
    ))
}
