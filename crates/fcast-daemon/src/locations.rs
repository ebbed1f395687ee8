//! Location list reader

use anyhow::{Context, Result};
use fcast_core::Location;
use std::fs;
use std::path::Path;

/// Split a comma and/or newline separated list of zip codes
pub fn parse_locations(text: &str) -> Vec<Location> {
    text.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|zipcode| !zipcode.is_empty())
        .map(Location::new)
        .collect()
}

pub fn read_locations(path: impl AsRef<Path>) -> Result<Vec<Location>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read location list {}", path.display()))?;
    Ok(parse_locations(&text))
}
