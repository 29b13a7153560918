//! Merge command - consolidate environment files onto stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::merge;
use crate::parser;

/// Execute the merge command: read every file in argument order, merge,
/// and write the consolidated environment to stdout as YAML.
pub fn execute(files: &[PathBuf], remove_builds: bool) -> Result<()> {
    let merged = render(files, remove_builds)?;
    io::stdout()
        .write_all(merged.as_bytes())
        .context("Failed to write merged environment")?;
    Ok(())
}

/// Produce the merged environment as YAML text.
///
/// Later files take precedence for scalar fields; list fields accumulate
/// in first-seen order.
pub fn render(files: &[PathBuf], remove_builds: bool) -> Result<String> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        debug!(path = %path.display(), "loading environment file");
        documents.push(parser::load_environment(path)?);
    }

    let merged =
        merge::merge(&documents, remove_builds).context("Failed to merge environment files")?;
    debug!(keys = merged.len(), "merged environment assembled");

    serde_yaml::to_string(&merged).context("Failed to serialize merged environment")
}
