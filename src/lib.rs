//! Extracts railway related features from OpenStreetMap XML dumps.
//!
//! The input is read three times through a double buffered, multi-stream aware
//! decompressing line reader ([`planet`]). The first two passes collect the ids of
//! interesting elements and of everything they reference; the third writes those elements
//! out as a smaller OSM XML document ([`selection`]).

pub mod config;
pub mod data;
pub mod errors;
pub mod filter;
pub mod id_set;
pub mod parse;
pub mod pass;
pub mod planet;
pub mod selection;
pub mod xml;

pub use errors::{Error, ErrorKind, Result};
pub use selection::{run, Selection, Summary};
