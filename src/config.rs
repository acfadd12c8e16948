use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::filter::{default_patterns, TagFilter, TagPattern};

/// Largest bzip2 block. Each decompression buffer holds this much text by default.
pub const DEFAULT_BUFFER_SIZE: usize = 900_000;
pub const DEFAULT_GENERATOR: &str = "osmrail";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    pub tags: Vec<TagPattern>,
    pub buffer_size: usize,
    pub log_level: String,
    pub generator: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            tags: default_patterns(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            generator: DEFAULT_GENERATOR.to_string(),
        }
    }
}

impl UserConfig {
    pub fn tag_filter(&self) -> Result<TagFilter> {
        TagFilter::new(self.tags.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::config("buffer_size must be at least 1 byte"));
        }
        if self.tags.is_empty() {
            return Err(Error::config("at least one tag pattern is required"));
        }
        match self.log_level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(Error::config(format!("unknown log level {other:?}"))),
        }
    }
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path).map_err(|err| {
        Error::config(format!("could not open config file {}: {err}", path.display()))
    })?;
    let config: UserConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    Ok(config)
}
