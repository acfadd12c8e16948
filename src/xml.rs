//! OSM XML output and the entity handling shared with the parser.

use std::borrow::Cow;
use std::io::Write;

use crate::data::{Member, Node, Relation, Tag, Way};
use crate::errors::Result;

const ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&apos;", '\''),
    ("&quot;", '"'),
    ("&lt;", '<'),
    ("&gt;", '>'),
];

/// Replaces the five named XML entities. Anything else starting with `&`, numeric character
/// references included, is kept as it is.
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Escapes `' " < > &` for use inside a quoted attribute. An `&` directly followed by `#`
/// starts a character reference and is left alone.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['\'', '"', '<', '>', '&']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if chars.peek() != Some(&'#') => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

pub struct OsmXmlWriter<W: Write> {
    out: W,
}

impl<W: Write> OsmXmlWriter<W> {
    /// Writes the XML declaration and opens the `<osm>` root.
    pub fn start(mut out: W, generator: &str) -> Result<Self> {
        writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
        writeln!(out, "<osm version=\"0.6\" generator=\"{}\">", escape(generator))?;
        Ok(OsmXmlWriter { out })
    }

    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        write!(self.out, "  <node id=\"{}\" lat=\"{:.7}\" lon=\"{:.7}\"", node.id, node.lat, node.lon)?;
        if node.tags.is_empty() {
            writeln!(self.out, "/>")?;
            return Ok(());
        }
        writeln!(self.out, ">")?;
        self.write_tags(&node.tags)?;
        writeln!(self.out, "  </node>")?;
        Ok(())
    }

    pub fn write_way(&mut self, way: &Way) -> Result<()> {
        writeln!(self.out, "  <way id=\"{}\">", way.id)?;
        for node_id in &way.nodes {
            writeln!(self.out, "    <nd ref=\"{node_id}\"/>")?;
        }
        self.write_tags(&way.tags)?;
        writeln!(self.out, "  </way>")?;
        Ok(())
    }

    pub fn write_relation(&mut self, relation: &Relation) -> Result<()> {
        writeln!(self.out, "  <relation id=\"{}\">", relation.id)?;
        self.write_members("node", &relation.nodes)?;
        self.write_members("way", &relation.ways)?;
        self.write_tags(&relation.tags)?;
        writeln!(self.out, "  </relation>")?;
        Ok(())
    }

    fn write_members(&mut self, kind: &str, members: &[Member]) -> Result<()> {
        for member in members {
            writeln!(
                self.out,
                "    <member type=\"{kind}\" ref=\"{}\" role=\"{}\"/>",
                member.id,
                escape(&member.role)
            )?;
        }
        Ok(())
    }

    fn write_tags(&mut self, tags: &[Tag]) -> Result<()> {
        for tag in tags {
            writeln!(self.out, "    <tag k=\"{}\" v=\"{}\" />", escape(&tag.key), escape(&tag.value))?;
        }
        Ok(())
    }

    /// Closes the root element, flushes and hands back the writer.
    pub fn finish(mut self) -> Result<W> {
        writeln!(self.out, "</osm>")?;
        self.out.flush()?;
        Ok(self.out)
    }
}
