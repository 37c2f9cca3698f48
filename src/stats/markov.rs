//! Second-order Markov background model for word-count expectations.
//!
//! The model gives the probability of seeing a word by chance given local
//! composition: an initial dinucleotide distribution estimated from
//! dinucleotide frequencies and transition probabilities P(z | xy)
//! estimated from trinucleotide frequencies, both Laplace-smoothed.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use statrs::distribution::{Binomial, DiscreteCDF};
use std::collections::HashSet;

use crate::bio::kmers::base_code;
use crate::error::SequenceError;

/// Second-order Markov model over ACGT.
#[derive(Debug, Clone)]
pub struct MarkovModel {
    /// P(b1 b2), indexed by the packed dinucleotide code.
    init: [f64; 16],
    /// P(z | xy), indexed by dinucleotide code then base code.
    trans: [[f64; 4]; 16],
}

impl MarkovModel {
    /// Fit from dinucleotide and trinucleotide frequencies. Windows
    /// touching a non-ACGT base are not counted. Laplace smoothing adds 1
    /// per dinucleotide (of 16) and 1 per continuation (of 4).
    pub fn fit(seq: &[u8]) -> Result<Self, SequenceError> {
        if seq.len() < 3 {
            return Err(SequenceError::TooShort {
                length: seq.len(),
                minimum: 3,
            });
        }
        let mut di = [0u64; 16];
        let mut tri = [0u64; 64];
        let mut code = 0usize;
        let mut run = 0usize;
        for &b in seq {
            match base_code(b) {
                Some(c) => {
                    code = ((code << 2) | c as usize) & 0x3f;
                    run += 1;
                    if run >= 2 {
                        di[code & 0xf] += 1;
                    }
                    if run >= 3 {
                        tri[code] += 1;
                    }
                }
                None => {
                    run = 0;
                    code = 0;
                }
            }
        }

        let total_di: u64 = di.iter().sum();
        let mut init = [0.0; 16];
        for (slot, &count) in init.iter_mut().zip(&di) {
            *slot = (count + 1) as f64 / (total_di + 16) as f64;
        }

        let mut trans = [[0.0; 4]; 16];
        for (xy, row) in trans.iter_mut().enumerate() {
            let total_xy: u64 = (0..4).map(|z| tri[(xy << 2) | z]).sum::<u64>() + 4;
            for (z, slot) in row.iter_mut().enumerate() {
                *slot = (tri[(xy << 2) | z] + 1) as f64 / total_xy as f64;
            }
        }

        Ok(MarkovModel { init, trans })
    }

    /// Probability of a word: the initial dinucleotide probability times
    /// the chain of conditional transitions. None for words shorter than
    /// two bases or containing non-ACGT characters.
    pub fn word_probability(&self, word: &[u8]) -> Option<f64> {
        if word.len() < 2 {
            return None;
        }
        let codes: Vec<usize> = word
            .iter()
            .map(|&b| base_code(b).map(|c| c as usize))
            .collect::<Option<_>>()?;
        let mut p = self.init[(codes[0] << 2) | codes[1]];
        for i in 2..codes.len() {
            let xy = (codes[i - 2] << 2) | codes[i - 1];
            p *= self.trans[xy][codes[i]];
        }
        Some(p)
    }

    /// Expected count of a word set over a region of the given length:
    /// `(L - k + 1) * sum(P(word))`. Zero when the region is shorter
    /// than k.
    pub fn expected_count(&self, region_len: usize, k: usize, words: &[Vec<u8>]) -> f64 {
        if region_len < k {
            return 0.0;
        }
        let n = (region_len - k + 1) as f64;
        n * words
            .iter()
            .filter_map(|w| self.word_probability(w))
            .sum::<f64>()
    }
}

/// Occurrences of any word of the set (all the same length) in a
/// sequence.
pub fn count_word_occurrences(seq: &[u8], words: &[Vec<u8>]) -> u64 {
    let Some(k) = words.first().map(Vec::len) else {
        return 0;
    };
    if k == 0 || seq.len() < k {
        return 0;
    }
    let set: HashSet<&[u8]> = words.iter().map(Vec::as_slice).collect();
    seq.windows(k).filter(|w| set.contains(*w)).count() as u64
}

/// Pseudocount for the log enrichment ratio.
const LOG_ALPHA: f64 = 0.5;

/// One-sided enrichment/depletion test of region A against the model
/// expectation.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentTest {
    pub expected_a: f64,
    pub expected_b: f64,
    pub observed_a: u64,
    pub observed_b: u64,
    /// E_A / (E_A + E_B); None when the totals are degenerate.
    pub p_expected_a: Option<f64>,
    /// Binomial CDF of O_A at n = O_A + O_B; None when not computable.
    pub p_value: Option<f64>,
    /// log((O_A+a)/(E_A+a)) - log((O_B+a)/(E_B+a)), a = 0.5.
    pub delta_l: f64,
}

/// Split the sequence at `split_at`, fit a model per region, and test the
/// observed word-set count in the first region against its share of the
/// combined expectation.
///
/// When the total expectation or the total observation is zero the test
/// is undefined: both probabilities come back as None rather than zero.
pub fn positional_enrichment(
    seq: &[u8],
    words: &[Vec<u8>],
    split_at: usize,
) -> Result<EnrichmentTest> {
    let Some(k) = words.first().map(Vec::len) else {
        bail!("empty word set");
    };
    if words.iter().any(|w| w.len() != k) {
        bail!("word set mixes lengths; all words must be {k} bases");
    }
    let cut = split_at.min(seq.len());
    let (a, b) = seq.split_at(cut);
    let model_a = MarkovModel::fit(a)?;
    let model_b = MarkovModel::fit(b)?;
    let expected_a = model_a.expected_count(a.len(), k, words);
    let expected_b = model_b.expected_count(b.len(), k, words);
    let observed_a = count_word_occurrences(a, words);
    let observed_b = count_word_occurrences(b, words);
    let total = observed_a + observed_b;

    let (p_expected_a, p_value) = if expected_a + expected_b > 0.0 && total > 0 {
        let p = expected_a / (expected_a + expected_b);
        let binom =
            Binomial::new(p, total).map_err(|e| anyhow!("binomial test (p={p}, n={total}): {e}"))?;
        (Some(p), Some(binom.cdf(observed_a)))
    } else {
        (None, None)
    };

    let delta_l = ((observed_a as f64 + LOG_ALPHA) / (expected_a + LOG_ALPHA)).ln()
        - ((observed_b as f64 + LOG_ALPHA) / (expected_b + LOG_ALPHA)).ln();

    Ok(EnrichmentTest {
        expected_a,
        expected_b,
        observed_a,
        observed_b,
        p_expected_a,
        p_value,
        delta_l,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Deterministic mixed-composition test sequence.
    fn synthetic_sequence(len: usize) -> Vec<u8> {
        let pattern = b"ACGTTGCAACGGTACCATGT";
        pattern.iter().copied().cycle().take(len).collect()
    }

    #[test]
    fn test_fit_too_short() {
        match MarkovModel::fit(b"AC") {
            Err(SequenceError::TooShort { length: 2, minimum: 3 }) => {}
            other => panic!("expected TooShort, got {other:?}"),
        }
    }

    #[test]
    fn test_word_probabilities_sum_to_one() {
        let model = MarkovModel::fit(&synthetic_sequence(2000)).unwrap();
        for k in 2..=4 {
            let sum: f64 = (0..4usize.pow(k))
                .map(|code| {
                    let word: Vec<u8> = (0..k)
                        .rev()
                        .map(|i| b"ACGT"[(code >> (2 * i)) & 3])
                        .collect();
                    model.word_probability(&word).unwrap()
                })
                .sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_word_probability_rejects_ambiguous() {
        let model = MarkovModel::fit(&synthetic_sequence(100)).unwrap();
        assert!(model.word_probability(b"ACN").is_none());
        assert!(model.word_probability(b"A").is_none());
    }

    #[test]
    fn test_expected_count_short_region_is_zero() {
        let model = MarkovModel::fit(&synthetic_sequence(100)).unwrap();
        assert_eq!(model.expected_count(3, 6, &[b"GAATTC".to_vec()]), 0.0);
    }

    #[test]
    fn test_count_word_occurrences() {
        let words = vec![b"GAATTC".to_vec(), b"GGATCC".to_vec()];
        assert_eq!(count_word_occurrences(b"AAGAATTCAGGATCC", &words), 2);
        assert_eq!(count_word_occurrences(b"AAAA", &words), 0);
    }

    #[test]
    fn test_positional_enrichment_degenerate_is_none() {
        // The word never occurs: totals are zero, so the test is undefined
        // but must not fail or report numeric zeros.
        let seq: Vec<u8> = b"AT".iter().copied().cycle().take(400).collect();
        let result = positional_enrichment(&seq, &[b"GGGGGG".to_vec()], 200).unwrap();
        assert_eq!(result.observed_a + result.observed_b, 0);
        assert!(result.p_expected_a.is_none());
        assert!(result.p_value.is_none());
        assert!(result.delta_l.is_finite());
    }

    #[test]
    fn test_positional_enrichment_sane_probabilities() {
        let seq = synthetic_sequence(4000);
        let result = positional_enrichment(&seq, &[b"ACGT".to_vec()], 1000).unwrap();
        let p = result.p_expected_a.unwrap();
        assert!(p > 0.0 && p < 1.0);
        let pval = result.p_value.unwrap();
        assert!((0.0..=1.0).contains(&pval));
        assert!(result.observed_a > 0);
    }

    #[test]
    fn test_positional_enrichment_rejects_mixed_lengths() {
        let seq = synthetic_sequence(100);
        assert!(positional_enrichment(&seq, &[b"ACGT".to_vec(), b"ACG".to_vec()], 50).is_err());
        assert!(positional_enrichment(&seq, &[], 50).is_err());
    }
}
