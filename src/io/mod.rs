//! Input/output: FASTA, external reports, tabular result writers.

pub mod einverted;
pub mod fasta;

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::bio::kmers::KmerCounts;

/// Writer for `--output`: the file when given, stdout otherwise.
pub fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file = File::create(p)
                .with_context(|| format!("failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Serialize rows as delimiter-separated text under an explicit header.
///
/// The header is written even when `rows` is empty, so a run that finds
/// nothing still produces a well-formed table.
pub fn write_rows<W: Write, T: Serialize>(
    writer: W,
    delimiter: u8,
    header: &[&str],
    rows: &[T],
) -> Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(writer);
    out.write_record(header)?;
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// One `word,count` CSV row per k-mer, full table in lexicographic order.
pub fn write_kmer_counts<W: Write>(writer: W, counts: &KmerCounts) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["word", "count"])?;
    for (word, count) in counts.iter_words() {
        out.write_record([&word[..], count.to_string().as_bytes()])?;
    }
    out.flush()?;
    Ok(())
}

/// `NA` marker for values a record could not produce.
pub fn na(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NA".to_string(),
    }
}

/// One row of the leading-region composition report. Plasmids shorter
/// than the requested leading region keep their identity columns and get
/// `NA` everywhere else.
#[derive(Debug, Clone, Serialize)]
pub struct LeadingReportRow {
    pub ptu: String,
    pub plasmid: String,
    pub plasmid_length: usize,
    pub leading_region_taken: usize,
    #[serde(rename = "leading_region_GC")]
    pub leading_region_gc: String,
    #[serde(rename = "rest_of_plasmid_GC")]
    pub rest_of_plasmid_gc: String,
    pub leading_region_density: String,
    pub rest_plasmid_density: String,
}

impl LeadingReportRow {
    pub const HEADER: [&'static str; 8] = [
        "ptu",
        "plasmid",
        "plasmid_length",
        "leading_region_taken",
        "leading_region_GC",
        "rest_of_plasmid_GC",
        "leading_region_density",
        "rest_plasmid_density",
    ];
}

/// Target words, one per line; blank lines and `#` comments ignored,
/// everything uppercased.
pub fn load_target_words(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read word list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_ascii_uppercase)
        .collect())
}

/// Codon relative-adaptiveness weights: `codon<TAB>weight` per line, `#`
/// comments allowed.
pub fn load_codon_weights(path: &Path) -> Result<HashMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read weight table {}", path.display()))?;
    let mut weights = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(codon), Some(raw)) = (fields.next(), fields.next()) else {
            anyhow::bail!("weight table line {} is not 'codon weight'", lineno + 1);
        };
        let weight: f64 = raw
            .parse()
            .with_context(|| format!("bad weight '{raw}' on line {}", lineno + 1))?;
        weights.insert(codon.to_ascii_uppercase(), weight);
    }
    Ok(weights)
}
