use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info};
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osmrail::config::{load_user_config, UserConfig, DEFAULT_LOG_LEVEL};
use osmrail::errors::{Error, ErrorKind, Result};
use osmrail::filter::TagPattern;
use osmrail::selection::{run, Summary};

/// Extract railway features from a compressed OpenStreetMap XML file.
#[derive(Parser)]
#[command(name = "osmrail", version, about, long_about = None)]
struct Cli {
    /// OSM XML file, bzip2 or xz compressed or plain
    input: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interest pattern KEY=VALUE, `*` matches anything. Replaces the configured patterns
    #[arg(short = 't', long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<TagPattern>,

    /// Write the result here instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Size in bytes of each decompression buffer
    #[arg(long)]
    buffer_size: Option<usize>,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

fn build_config(cli: &Cli) -> Result<UserConfig> {
    let mut config = match &cli.config {
        Some(path) => load_user_config(path)?,
        None => UserConfig::default(),
    };
    if !cli.tags.is_empty() {
        config.tags = cli.tags.clone();
    }
    if let Some(buffer_size) = cli.buffer_size {
        config.buffer_size = buffer_size;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn setup_logging(level: &str) {
    // Standard output carries the filtered document.
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
}

fn filter_into<W: Write>(input: &Path, config: &UserConfig, out: W) -> Result<Summary> {
    let (_, summary) = run(input, config, out)?;
    Ok(summary)
}

fn filter_planet(cli: &Cli, config: &UserConfig) -> Result<()> {
    let tags = config
        .tags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let input = cli.input.display().to_string();
    info!(input = input.as_str(), tags = tags.as_str(), buffer_size = config.buffer_size; "Starting osmrail");

    let summary = match &cli.output {
        Some(path) => {
            let file = File::create(path).map_err(|err| {
                Error::new(ErrorKind::Io, format!("unable to create {}: {err}", path.display()))
            })?;
            filter_into(&cli.input, config, BufWriter::new(file))?
        }
        None => filter_into(&cli.input, config, BufWriter::new(io::stdout().lock()))?,
    };

    info!(
        nodes = summary.emitted.nodes,
        ways = summary.emitted.ways,
        relations = summary.emitted.relations,
        malformed = summary.scans.malformed;
        "Finished"
    );
    check_resources(&summary)
}

/// A run whose output is complete still fails if a reader was not shut down cleanly.
fn check_resources(summary: &Summary) -> Result<()> {
    if summary.scans.resource_warnings > 0 {
        return Err(Error::resource(format!(
            "{} reader(s) did not shut down cleanly",
            summary.scans.resource_warnings
        )));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    setup_logging(config.as_ref().map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str()));

    let result = config.and_then(|config| filter_planet(&cli, &config));
    if let Err(err) = &result {
        error!(kind = err.kind.as_str(), err = err.message.as_str(); "osmrail failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use osmrail::pass::ScanStats;

    use super::*;

    #[test]
    fn clean_run_succeeds() {
        assert!(check_resources(&Summary::default()).is_ok());
    }

    #[test]
    fn resource_warnings_fail_the_run() {
        let summary = Summary {
            scans: ScanStats { resource_warnings: 2, ..ScanStats::default() },
            ..Summary::default()
        };
        let err = check_resources(&summary).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Resource);
        assert!(err.message.starts_with("2 reader(s)"));
    }
}
