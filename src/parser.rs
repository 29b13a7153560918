//! Reading and parsing environment files.
//!
//! The merge engine works on parsed YAML values; this module is the thin
//! boundary that turns file paths into those values, with the offending
//! path attached to any failure.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::Value;

/// Parse one environment document from YAML text.
pub fn parse_environment(content: &str) -> Result<Value> {
    serde_yaml::from_str(content).context("Failed to parse environment YAML")
}

/// Load and parse an environment file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not contain valid
/// YAML. Shape problems (e.g. a non-mapping document) are left to the merge
/// engine.
pub fn load_environment(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read environment file: {}", path.display()))?;
    parse_environment(&content)
        .with_context(|| format!("Failed to parse environment file: {}", path.display()))
}
