use std::fmt;

use serde::Deserialize;

use crate::data::Tag;
use crate::errors::{Error, Result};

pub const WILDCARD: &str = "*";

/// One side of a tag pattern: either a literal string or the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Field {
    Any,
    Is(String),
}

impl Field {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Field::Any => true,
            Field::Is(wanted) => wanted == candidate,
        }
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        if value == WILDCARD {
            Field::Any
        } else {
            Field::Is(value)
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::from(value.to_string())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Any => f.write_str(WILDCARD),
            Field::Is(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagPattern {
    pub key: Field,
    pub value: Field,
}

impl TagPattern {
    pub fn new(key: impl Into<Field>, value: impl Into<Field>) -> Self {
        TagPattern {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        self.key.matches(&tag.key) && self.value.matches(&tag.value)
    }
}

impl std::str::FromStr for TagPattern {
    type Err = Error;

    /// Parses `key=value`, where either side may be `*`.
    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| Error::config(format!("tag pattern {s:?} is not of the form KEY=VALUE")))?;
        if key.is_empty() {
            return Err(Error::config(format!("tag pattern {s:?} has an empty key")));
        }
        Ok(TagPattern::new(key, value))
    }
}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered list of patterns. A record is interesting when any of its tags matches any pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    patterns: Vec<TagPattern>,
}

impl TagFilter {
    pub fn new(patterns: Vec<TagPattern>) -> Result<Self> {
        if patterns.is_empty() {
            return Err(Error::config("at least one tag pattern is required"));
        }
        Ok(TagFilter { patterns })
    }

    /// `railway=*` or `route=train`.
    pub fn railway() -> Self {
        TagFilter {
            patterns: default_patterns(),
        }
    }

    pub fn patterns(&self) -> &[TagPattern] {
        &self.patterns
    }

    pub fn matches(&self, tags: &[Tag]) -> bool {
        tags.iter()
            .any(|tag| self.patterns.iter().any(|pattern| pattern.matches(tag)))
    }
}

pub fn default_patterns() -> Vec<TagPattern> {
    vec![
        TagPattern::new("railway", WILDCARD),
        TagPattern::new("route", "train"),
    ]
}
