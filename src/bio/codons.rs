//! Codon usage and the Codon Adaptation Index.

use std::collections::HashMap;

/// Non-overlapping codon counts over a coding sequence. A trailing partial
/// triplet is dropped.
pub fn codon_usage(seq: &[u8]) -> HashMap<[u8; 3], u64> {
    let mut usage = HashMap::new();
    for chunk in seq.chunks_exact(3) {
        let codon = [
            chunk[0].to_ascii_uppercase(),
            chunk[1].to_ascii_uppercase(),
            chunk[2].to_ascii_uppercase(),
        ];
        *usage.entry(codon).or_insert(0) += 1;
    }
    usage
}

/// CAI as defined by Sharp and Li (1987): the geometric mean of relative
/// adaptiveness weights over the gene's codons.
///
/// Codons without a positive weight contribute nothing to the log sum but
/// still count toward the denominator. None when the gene has no complete
/// codons.
pub fn compute_cai(usage: &HashMap<[u8; 3], u64>, weights: &HashMap<String, f64>) -> Option<f64> {
    let total: u64 = usage.values().sum();
    if total == 0 {
        return None;
    }
    let mut log_sum = 0.0;
    for (codon, &count) in usage {
        let Ok(key) = std::str::from_utf8(codon) else {
            continue;
        };
        if let Some(&w) = weights.get(key) {
            if w > 0.0 {
                log_sum += count as f64 * w.ln();
            }
        }
    }
    Some((log_sum / total as f64).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weights(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(c, w)| (c.to_string(), *w)).collect()
    }

    #[test]
    fn test_codon_usage_counts() {
        let usage = codon_usage(b"ATGATGTAA");
        assert_eq!(usage.get(b"ATG"), Some(&2));
        assert_eq!(usage.get(b"TAA"), Some(&1));
        assert_eq!(usage.len(), 2);
    }

    #[test]
    fn test_codon_usage_drops_trailing_partial() {
        let usage = codon_usage(b"ATGAT");
        assert_eq!(usage.get(b"ATG"), Some(&1));
        assert_eq!(usage.len(), 1);
    }

    #[test]
    fn test_cai_uniform_weights_is_one() {
        let usage = codon_usage(b"ATGGCTTAA");
        let w = weights(&[("ATG", 1.0), ("GCT", 1.0), ("TAA", 1.0)]);
        assert_relative_eq!(compute_cai(&usage, &w).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cai_geometric_mean() {
        // Two codons with weights 1.0 and 0.25: geometric mean 0.5.
        let usage = codon_usage(b"ATGGCT");
        let w = weights(&[("ATG", 1.0), ("GCT", 0.25)]);
        assert_relative_eq!(compute_cai(&usage, &w).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cai_empty_gene_is_none() {
        let usage = codon_usage(b"AT");
        assert!(compute_cai(&usage, &weights(&[])).is_none());
    }
}
