//! Parser for EMBOSS einverted text reports.
//!
//! A report is a stream of four-line records:
//!
//! ```text
//! contig: Score 86: 34/40 ( 85%) matches, 2 gaps
//!      101 acgtacgtac 110
//!          ||||||||||
//!      160 tgcatgcatg 151
//! ```
//!
//! The header carries the contig name before the first colon; the two
//! alignment lines each carry a start coordinate, the aligned bases, and
//! an end coordinate. A hit spans from the minimum to the maximum of the
//! four coordinates, which covers both arms and the loop between them.

use log::warn;

use crate::bio;
use crate::windows::Hit;

/// Coordinates of one alignment line: `start bases end` with `bases`
/// strictly ACGT (either case). None for anything else, including the
/// match-bar line between the arms.
fn alignment_coords(line: &str) -> Option<(usize, usize)> {
    let mut tokens = line.split_whitespace();
    let start: usize = tokens.next()?.parse().ok()?;
    let bases = tokens.next()?;
    if bases.is_empty() || !bases.bytes().all(bio::is_acgt) {
        return None;
    }
    let end: usize = tokens.next()?.parse().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((start, end))
}

/// Parse a full einverted report into hits. Records that do not match the
/// four-line shape are skipped with a warning rather than failing the
/// whole report.
pub fn parse_einverted_text(text: &str) -> Vec<Hit> {
    let lines: Vec<&str> = text.lines().collect();
    let mut hits = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let Some((contig, _)) = line.split_once(':') else {
            i += 1;
            continue;
        };
        let contig = contig.trim();
        if contig.is_empty() {
            i += 1;
            continue;
        }
        if lines.len() - i < 4 {
            break;
        }
        let first = alignment_coords(lines[i + 1]);
        let second = alignment_coords(lines[i + 3]);
        match (first, second) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => {
                let coords = [a_start, a_end, b_start, b_end];
                // min/max over a non-empty fixed array cannot fail.
                let start = coords.iter().copied().min().unwrap_or(a_start);
                let end = coords.iter().copied().max().unwrap_or(b_end);
                hits.push(Hit {
                    contig: contig.to_string(),
                    start,
                    end,
                });
                i += 4;
            }
            _ => {
                // Skip the whole record: rescanning its remaining lines
                // could mistake a stray ':' for the next header.
                warn!("skipping malformed einverted record for '{contig}'");
                i += 4;
            }
        }
    }
    hits
}
