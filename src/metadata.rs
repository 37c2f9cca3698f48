//! Plasmid metadata table: leading-region annotations and PTU labels.
//!
//! The annotation table is tab-delimited with the plasmid id in the first
//! column, a `Leading Region` column holding strings of the shape
//! `From 12345 in downstream direction.`, and an optional `PTU` column.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::warn;
use std::path::Path;

use crate::bio::Orientation;
use crate::error::SequenceError;

/// Where transfer starts and which way it proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingRegion {
    /// 1-indexed start position on the plasmid.
    pub start: usize,
    pub orientation: Orientation,
}

#[derive(Debug, Clone)]
pub struct PlasmidInfo {
    pub region: LeadingRegion,
    pub ptu: Option<String>,
}

impl PlasmidInfo {
    /// PTU label with a placeholder for unassigned plasmids.
    pub fn ptu_label(&self) -> &str {
        self.ptu.as_deref().unwrap_or("-")
    }
}

/// Annotations keyed by plasmid id, in table order.
#[derive(Debug, Clone, Default)]
pub struct PlasmidTable {
    entries: IndexMap<String, PlasmidInfo>,
}

impl PlasmidTable {
    pub fn get(&self, plasmid: &str) -> Option<&PlasmidInfo> {
        self.entries.get(plasmid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlasmidInfo)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a `From <pos> in <direction> direction.` annotation.
pub fn parse_leading_region(text: &str) -> Result<LeadingRegion, SequenceError> {
    let malformed =
        || SequenceError::malformed(format!("unparseable leading-region string '{text}'"));
    let rest = text.trim().strip_prefix("From ").ok_or_else(malformed)?;
    let (pos, rest) = rest.split_once(" in ").ok_or_else(malformed)?;
    let direction = rest
        .trim_end_matches('.')
        .strip_suffix(" direction")
        .ok_or_else(malformed)?;
    let start: usize = pos.trim().parse().map_err(|_| malformed())?;
    if start == 0 {
        return Err(SequenceError::malformed(format!(
            "leading-region start must be 1-indexed, got 0 in '{text}'"
        )));
    }
    let orientation: Orientation = direction.trim().parse()?;
    Ok(LeadingRegion { start, orientation })
}

/// Load the annotation table. Rows with an unparseable leading-region
/// string are skipped with a warning; a plasmid id appearing more than
/// once (two oriT annotations) is dropped entirely. Fails only when no
/// usable row remains.
pub fn load_plasmid_table(path: &Path) -> Result<PlasmidTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open annotation table {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let region_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("leading region"))
        .with_context(|| format!("no 'Leading Region' column in {}", path.display()))?;
    let ptu_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ptu"));

    let mut entries: IndexMap<String, PlasmidInfo> = IndexMap::new();
    let mut duplicates: Vec<String> = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping unreadable row in {}: {e}", path.display());
                continue;
            }
        };
        let Some(plasmid) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(raw_region) = record.get(region_col) else {
            warn!("skipping '{plasmid}': row has no leading-region field");
            continue;
        };
        let region = match parse_leading_region(raw_region) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping '{plasmid}': {e}");
                continue;
            }
        };
        let ptu = ptu_col
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-")
            .map(str::to_string);
        if entries
            .insert(plasmid.to_string(), PlasmidInfo { region, ptu })
            .is_some()
        {
            duplicates.push(plasmid.to_string());
        }
    }
    for plasmid in duplicates {
        warn!("dropping '{plasmid}': multiple leading-region annotations");
        entries.shift_remove(&plasmid);
    }
    if entries.is_empty() {
        bail!("no usable annotation rows in {}", path.display());
    }
    Ok(PlasmidTable { entries })
}
