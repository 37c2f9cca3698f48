//! Statistical comparison of word-score tables between plasmid groups.

pub mod markov;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashSet;
use std::path::Path;

/// One row of an exceptional-word score table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRow {
    pub word: String,
    pub score: f64,
}

/// Load a `word,score` CSV into a table keyed by uppercase word.
pub fn load_score_table(path: &Path) -> Result<IndexMap<String, f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open score table {}", path.display()))?;
    let mut scores = IndexMap::new();
    for row in reader.deserialize() {
        let row: ScoreRow =
            row.with_context(|| format!("bad row in score table {}", path.display()))?;
        if scores.insert(row.word.to_ascii_uppercase(), row.score).is_some() {
            warn!("duplicate word '{}' in {}; keeping last", row.word, path.display());
        }
    }
    Ok(scores)
}

/// Per-word score difference between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub word: String,
    pub value: f64,
}

/// Inner join of two score tables on word: `score_a - score_b` for every
/// word present in both, in the first table's order. Words missing from
/// either side are dropped with a warning.
pub fn merge_discrepancies(
    a: &IndexMap<String, f64>,
    b: &IndexMap<String, f64>,
) -> Vec<Discrepancy> {
    let mut out = Vec::with_capacity(a.len());
    for (word, &score_a) in a {
        match b.get(word) {
            Some(&score_b) => out.push(Discrepancy {
                word: word.clone(),
                value: score_a - score_b,
            }),
            None => warn!("word '{word}' has no score in the second table; dropped"),
        }
    }
    out
}

/// Median of a sample; None when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|x, y| x.total_cmp(y));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankSum {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sided Wilcoxon rank-sum test with the normal approximation and
/// midranks for ties, no continuity correction. None when either sample
/// is empty or the variance degenerates.
pub fn rank_sum_test(xs: &[f64], ys: &[f64]) -> Option<RankSum> {
    let n1 = xs.len();
    let n2 = ys.len();
    if n1 == 0 || n2 == 0 {
        return None;
    }
    let mut indexed: Vec<(f64, bool)> = xs
        .iter()
        .map(|&v| (v, true))
        .chain(ys.iter().map(|&v| (v, false)))
        .collect();
    indexed.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Midranks over runs of tied values.
    let mut rank_sum_x = 0.0;
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j < indexed.len() && indexed[j].0 == indexed[i].0 {
            j += 1;
        }
        let midrank = (i + j + 1) as f64 / 2.0;
        rank_sum_x += midrank * indexed[i..j].iter().filter(|(_, is_x)| *is_x).count() as f64;
        i = j;
    }

    let n1f = n1 as f64;
    let n2f = n2 as f64;
    let expected = n1f * (n1f + n2f + 1.0) / 2.0;
    let sd = (n1f * n2f * (n1f + n2f + 1.0) / 12.0).sqrt();
    if sd == 0.0 {
        return None;
    }
    let z = (rank_sum_x - expected) / sd;
    let normal = Normal::new(0.0, 1.0).ok()?;
    let p_value = 2.0 * normal.cdf(-z.abs());
    Some(RankSum {
        statistic: z,
        p_value,
    })
}

/// Summary of a target-vs-background discrepancy comparison. Every
/// numeric field is optional: a missing group or a degenerate test is
/// reported as not-computed, never as zero.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub label: String,
    pub median_discrepancy_targets: Option<f64>,
    pub median_discrepancy_others: Option<f64>,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
}

/// Compare two score tables: per-word discrepancies split into target
/// words and the rest, with group medians and a rank-sum test between
/// the groups.
pub fn compare_score_tables(
    a: &IndexMap<String, f64>,
    b: &IndexMap<String, f64>,
    targets: &[String],
    label: &str,
) -> ComparisonSummary {
    let target_set: HashSet<String> = targets.iter().map(|w| w.to_ascii_uppercase()).collect();
    let (target_values, other_values): (Vec<f64>, Vec<f64>) = {
        let mut t = Vec::new();
        let mut o = Vec::new();
        for d in merge_discrepancies(a, b) {
            if target_set.contains(&d.word) {
                t.push(d.value);
            } else {
                o.push(d.value);
            }
        }
        (t, o)
    };
    let rank_sum = rank_sum_test(&target_values, &other_values);
    ComparisonSummary {
        label: label.to_string(),
        median_discrepancy_targets: median(&target_values),
        median_discrepancy_others: median(&other_values),
        statistic: rank_sum.map(|r| r.statistic),
        p_value: rank_sum.map(|r| r.p_value),
    }
}
