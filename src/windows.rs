//! Sliding-window and fixed-bin partitioning of sequence coordinates.
//!
//! Two partitioning schemes feed every positional aggregation: overlapping
//! sliding windows of fixed size, and non-overlapping bins covering a full
//! contig. Both work in half-open [start, end) coordinates.

use indexmap::IndexMap;
use log::warn;
use serde::Serialize;

/// Half-open interval over sequence coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Sliding windows at offsets 0, step, 2*step, ... while the full window
/// fits; a trailing partial window is dropped, never padded.
pub fn sliding_windows(len: usize, window: usize, step: usize) -> Vec<Window> {
    if window == 0 || step == 0 || window > len {
        return Vec::new();
    }
    (0..=(len - window))
        .step_by(step)
        .map(|start| Window {
            start,
            end: start + window,
        })
        .collect()
}

/// `ceil(len / bin)` non-overlapping bins covering [0, len); the final
/// bin's end is clamped to `len` and may be shorter than `bin`.
pub fn fixed_bins(len: usize, bin: usize) -> Vec<Window> {
    if len == 0 || bin == 0 {
        return Vec::new();
    }
    let n = len.div_ceil(bin);
    (0..n)
        .map(|i| Window {
            start: i * bin,
            end: ((i + 1) * bin).min(len),
        })
        .collect()
}

/// A detected inverted-repeat interval on a contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub contig: String,
    pub start: usize,
    pub end: usize,
}

impl Hit {
    /// Midpoint used for bin assignment.
    pub fn midpoint(&self) -> usize {
        (self.start + self.end) / 2
    }
}

/// One row of the binned hit-density table.
#[derive(Debug, Clone, Serialize)]
pub struct BinDensity {
    pub genome: String,
    pub contig: String,
    pub start: usize,
    pub end: usize,
    pub count: u64,
    pub density_per_bp: f64,
}

impl BinDensity {
    pub const HEADER: [&'static str; 6] =
        ["genome", "contig", "start", "end", "count", "density_per_bp"];
}

/// Aggregate hit midpoints into fixed bins per contig.
///
/// Every bin of every contig in `lengths` appears in the output,
/// zero-filled when no hit falls in it; hits on contigs missing from
/// `lengths` are dropped with a warning. Row order follows `lengths`.
pub fn bin_hit_density(
    hits: &[Hit],
    lengths: &IndexMap<String, usize>,
    genome: &str,
    bin_size: usize,
) -> Vec<BinDensity> {
    let mut per_contig: IndexMap<&str, Vec<u64>> = lengths
        .iter()
        .map(|(contig, &len)| (contig.as_str(), vec![0u64; fixed_bins(len, bin_size).len()]))
        .collect();

    for hit in hits {
        match per_contig.get_mut(hit.contig.as_str()) {
            Some(bins) if !bins.is_empty() => {
                // 1-based report coordinates can place a midpoint exactly at
                // the contig end; it belongs to the last bin.
                let idx = (hit.midpoint() / bin_size).min(bins.len() - 1);
                bins[idx] += 1;
            }
            Some(_) => {}
            None => warn!(
                "hit on contig '{}' absent from the FASTA; dropped",
                hit.contig
            ),
        }
    }

    let mut rows = Vec::new();
    for (contig, &len) in lengths {
        let counts = &per_contig[contig.as_str()];
        for (i, w) in fixed_bins(len, bin_size).iter().enumerate() {
            rows.push(BinDensity {
                genome: genome.to_string(),
                contig: contig.clone(),
                start: w.start,
                end: w.end,
                count: counts[i],
                density_per_bp: counts[i] as f64 / w.len() as f64,
            });
        }
    }
    rows
}
