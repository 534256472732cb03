//! Seed data for the registry.
//!
//! A seed file lists one device identifier per line. Surrounding whitespace is
//! trimmed, blank lines and lines starting with `#` are ignored.

use crate::registry::DeviceId;
use anyhow::{Context, Result};
use std::{collections::BTreeSet, fs, path::Path};

/// Parse seed text into a de-duplicated, sorted list of identifiers.
#[must_use]
pub fn parse_seed(text: &str) -> Vec<DeviceId> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(DeviceId::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Read and parse a seed file.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn load_seed_file(path: &Path) -> Result<Vec<DeviceId>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trusted devices file {}", path.display()))?;
    Ok(parse_seed(&text))
}

/// Merge identifiers given inline with those from an optional seed file.
///
/// Inline values go through the same trimming as file lines, so an env var
/// like `a, b` yields `a` and `b`.
///
/// # Errors
/// Returns an error if the seed file cannot be read.
pub fn collect_seed(inline: &[String], file: Option<&Path>) -> Result<Vec<DeviceId>> {
    let mut ids: BTreeSet<DeviceId> = parse_seed(&inline.join("\n")).into_iter().collect();

    if let Some(path) = file {
        ids.extend(load_seed_file(path)?);
    }

    Ok(ids.into_iter().collect())
}
