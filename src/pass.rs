pub mod close_nodes;
pub mod discover;
pub mod emit;

use std::path::Path;
use std::time::Instant;

use log::{error, info, warn};

use crate::errors::Result;
use crate::parse::{Ingest, OsmHandler, OsmParser};
use crate::planet::PlanetReader;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: u64,
    pub malformed: u64,
    /// The closing `</osm>` was seen before end of file.
    pub end_of_data: bool,
    pub resource_warnings: usize,
}

impl ScanStats {
    pub fn absorb(&mut self, other: ScanStats) {
        self.lines += other.lines;
        self.malformed += other.malformed;
        self.resource_warnings += other.resource_warnings;
    }
}

/// Reads the whole file once, feeding every element to `handler`.
pub fn scan<H: OsmHandler + ?Sized>(path: &Path, buffer_size: usize, handler: &mut H) -> Result<ScanStats> {
    let mut reader = PlanetReader::open(path, buffer_size)?;
    let mut parser = OsmParser::new();
    let mut stats = ScanStats::default();

    while let Some(line) = reader.read_line()? {
        if parser.ingest(line, handler)? == Ingest::EndOfData {
            stats.end_of_data = true;
            break;
        }
    }
    stats.lines = reader.lines_read();
    stats.malformed = parser.malformed();

    if let Err(err) = reader.close() {
        if err.is_fatal() {
            return Err(err);
        }
        warn!(err = err.message.as_str(); "Planet reader was not closed cleanly");
        stats.resource_warnings += 1;
    }
    Ok(stats)
}

/// One traversal of the input with its own record handling.
pub trait Pass: OsmHandler {
    fn pass_name(&self) -> &str;

    fn process(&mut self, path: &Path, buffer_size: usize) -> Result<ScanStats> {
        info!(pass = self.pass_name(); "Starting pass");
        let started = Instant::now();
        let stats = match scan(path, buffer_size, self) {
            Ok(stats) => stats,
            Err(err) => {
                error!(pass = self.pass_name(), err = err.message.as_str(), kind = err.kind.as_str(); "Pass failed with error");
                return Err(err);
            }
        };
        if !stats.end_of_data {
            warn!(pass = self.pass_name(); "Input ended without closing </osm>");
        }
        info!(
            pass = self.pass_name(),
            lines = stats.lines,
            malformed = stats.malformed,
            millis = started.elapsed().as_millis() as u64;
            "Pass finished"
        );
        Ok(stats)
    }
}
