//! Line oriented parser for OSM (API 0.6) XML as written by the planet dumps, which put
//! every XML tag on a line of its own.
//!
//! Each line is scanned for its element name; attributes are tokenized with quick-xml.
//! A completed node, way or relation is handed to an [`OsmHandler`]. Only ids, coordinates,
//! tags and members are kept; metadata attributes are dropped.

use std::mem;
use std::str;

use log::{debug, warn};
use quick_xml::events::BytesStart;

use crate::data::{Member, Node, OsmId, Relation, Tag, Way};
use crate::errors::{Error, Result};
use crate::xml::unescape;

/// Receives each completed element. Every method defaults to ignoring the record.
pub trait OsmHandler {
    fn node(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }

    fn way(&mut self, _way: &Way) -> Result<()> {
        Ok(())
    }

    fn relation(&mut self, _relation: &Relation) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Continue,
    /// The root `</osm>` element was closed; nothing after it needs reading.
    EndOfData,
}

#[derive(Debug)]
enum ParserState {
    /// Before the `<osm>` root element.
    Prolog,
    Top,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

/// The single XML tag found on a line.
#[derive(Debug, PartialEq)]
struct Element<'a> {
    name: &'a str,
    /// Name plus attributes, without the angle brackets and slashes.
    content: &'a str,
    closing: bool,
    self_closing: bool,
}

fn scan_element(line: &str) -> Option<Element<'_>> {
    let start = line.find('<')?;
    let body = line[start + 1..].trim_start();
    let (closing, body) = match body.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let mut quote = None;
    let mut end = body.len();
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, '>') => {
                end = i;
                break;
            }
            _ => (),
        }
    }

    let content = body[..end].trim_end();
    let (self_closing, content) = match content.strip_suffix('/') {
        Some(rest) => (true, rest.trim_end()),
        None => (false, content),
    };
    let name_len = content
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(content.len());

    Some(Element {
        name: &content[..name_len],
        content,
        closing,
        self_closing,
    })
}

fn for_each_attribute(
    element: &Element,
    mut f: impl FnMut(&[u8], &str) -> Result<()>,
) -> Result<()> {
    let start = BytesStart::from_content(element.content, element.name.len());
    for attribute in start.attributes() {
        let attribute = attribute?;
        let raw = str::from_utf8(&attribute.value)?;
        f(attribute.key.as_ref(), &unescape(raw))?;
    }
    Ok(())
}

fn required<T>(value: Option<T>, element: &str, attribute: &str) -> Result<T> {
    value.ok_or_else(|| Error::malformed(format!("<{element}> without {attribute:?} attribute")))
}

fn parse_node(element: &Element) -> Result<Node> {
    let mut id: Option<OsmId> = None;
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for_each_attribute(element, |key, value| {
        match key {
            b"id" => id = Some(value.parse()?),
            b"lat" => lat = Some(value.parse()?),
            b"lon" => lon = Some(value.parse()?),
            _ => (),
        }
        Ok(())
    })?;

    Ok(Node {
        id: required(id, "node", "id")?,
        lat: required(lat, "node", "lat")?,
        lon: required(lon, "node", "lon")?,
        tags: Vec::new(),
    })
}

/// The `id` of a `<way>` or `<relation>` start tag, or the `ref` of an `<nd>`.
fn parse_id(element: &Element, attribute: &str) -> Result<OsmId> {
    let mut id: Option<OsmId> = None;
    for_each_attribute(element, |key, value| {
        if key == attribute.as_bytes() {
            id = Some(value.parse()?);
        }
        Ok(())
    })?;
    required(id, element.name, attribute)
}

fn parse_tag(element: &Element) -> Result<Tag> {
    let mut key = None;
    let mut value = None;
    for_each_attribute(element, |name, text| {
        match name {
            b"k" => key = Some(text.to_string()),
            b"v" => value = Some(text.to_string()),
            _ => (),
        }
        Ok(())
    })?;
    Ok(Tag {
        key: required(key, "tag", "k")?,
        value: required(value, "tag", "v")?,
    })
}

enum MemberRef {
    Node(Member),
    Way(Member),
    Relation(OsmId),
}

fn parse_member(element: &Element) -> Result<MemberRef> {
    let mut kind = None;
    let mut id: Option<OsmId> = None;
    let mut role = None;
    for_each_attribute(element, |name, text| {
        match name {
            b"type" => kind = Some(text.to_string()),
            b"ref" => id = Some(text.parse()?),
            b"role" => role = Some(text.to_string()),
            _ => (),
        }
        Ok(())
    })?;

    let kind = required(kind, "member", "type")?;
    let id = required(id, "member", "ref")?;
    match kind.as_str() {
        "node" => Ok(MemberRef::Node(Member::new(id, required(role, "member", "role")?))),
        "way" => Ok(MemberRef::Way(Member::new(id, required(role, "member", "role")?))),
        "relation" => Ok(MemberRef::Relation(id)),
        other => Err(Error::malformed(format!("unknown member type {other:?}"))),
    }
}

pub struct OsmParser {
    state: ParserState,
    malformed: u64,
}

impl OsmParser {
    pub fn new() -> OsmParser {
        OsmParser {
            state: ParserState::Prolog,
            malformed: 0,
        }
    }

    /// Number of lines skipped because they could not be parsed.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Feeds one line. Completed elements are passed to `handler`; an error from the handler
    /// aborts ingestion, malformed input does not.
    pub fn ingest<H: OsmHandler + ?Sized>(&mut self, line: &[u8], handler: &mut H) -> Result<Ingest> {
        let text = match str::from_utf8(line) {
            Ok(text) => text,
            Err(err) => {
                let lossy = String::from_utf8_lossy(line);
                self.skip("line", &Error::from(err), &lossy);
                return Ok(Ingest::Continue);
            }
        };
        let Some(element) = scan_element(text) else {
            return Ok(Ingest::Continue);
        };

        self.state = match mem::replace(&mut self.state, ParserState::Top) {
            ParserState::Prolog => {
                if !element.closing && element.name == "osm" {
                    ParserState::Top
                } else {
                    ParserState::Prolog
                }
            }
            ParserState::Top => return self.top_level(&element, text, handler),
            ParserState::Node(mut node) => {
                if element.closing && element.name == "node" {
                    handler.node(&node)?;
                    ParserState::Top
                } else {
                    if element.name == "tag" {
                        self.add_tag(&element, text, &mut node.tags);
                    }
                    ParserState::Node(node)
                }
            }
            ParserState::Way(mut way) => {
                if element.closing && element.name == "way" {
                    handler.way(&way)?;
                    ParserState::Top
                } else {
                    match element.name {
                        "nd" => match parse_id(&element, "ref") {
                            Ok(id) => way.nodes.push(id),
                            Err(err) => self.skip("way node", &err, text),
                        },
                        "tag" => self.add_tag(&element, text, &mut way.tags),
                        _ => (),
                    }
                    ParserState::Way(way)
                }
            }
            ParserState::Relation(mut relation) => {
                if element.closing && element.name == "relation" {
                    handler.relation(&relation)?;
                    ParserState::Top
                } else {
                    match element.name {
                        "member" => match parse_member(&element) {
                            Ok(MemberRef::Node(member)) => relation.nodes.push(member),
                            Ok(MemberRef::Way(member)) => relation.ways.push(member),
                            Ok(MemberRef::Relation(id)) => {
                                debug!(relation = relation.id, member = id; "Ignoring nested relation member");
                            }
                            Err(err) => self.skip("relation member", &err, text),
                        },
                        "tag" => self.add_tag(&element, text, &mut relation.tags),
                        _ => (),
                    }
                    ParserState::Relation(relation)
                }
            }
        };
        Ok(Ingest::Continue)
    }

    fn top_level<H: OsmHandler + ?Sized>(
        &mut self,
        element: &Element,
        line: &str,
        handler: &mut H,
    ) -> Result<Ingest> {
        if element.closing {
            if element.name == "osm" {
                return Ok(Ingest::EndOfData);
            }
            return Ok(Ingest::Continue);
        }

        match element.name {
            "node" => match parse_node(element) {
                Ok(node) if element.self_closing => handler.node(&node)?,
                Ok(node) => self.state = ParserState::Node(node),
                Err(err) => self.skip("node", &err, line),
            },
            "way" => match parse_id(element, "id") {
                Ok(id) => {
                    let way = Way { id, ..Way::default() };
                    if element.self_closing {
                        handler.way(&way)?;
                    } else {
                        self.state = ParserState::Way(way);
                    }
                }
                Err(err) => self.skip("way", &err, line),
            },
            "relation" => match parse_id(element, "id") {
                Ok(id) => {
                    let relation = Relation { id, ..Relation::default() };
                    if element.self_closing {
                        handler.relation(&relation)?;
                    } else {
                        self.state = ParserState::Relation(relation);
                    }
                }
                Err(err) => self.skip("relation", &err, line),
            },
            _ => (),
        }
        Ok(Ingest::Continue)
    }

    fn add_tag(&mut self, element: &Element, line: &str, tags: &mut Vec<Tag>) {
        match parse_tag(element) {
            Ok(tag) => tags.push(tag),
            Err(err) => self.skip("tag", &err, line),
        }
    }

    fn skip(&mut self, fragment: &str, err: &Error, line: &str) {
        self.malformed += 1;
        warn!(fragment = fragment, err = err.message.as_str(), line = line; "Skipping malformed input");
    }
}

impl Default for OsmParser {
    fn default() -> Self {
        OsmParser::new()
    }
}
