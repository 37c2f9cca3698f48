//! Dense k-mer count tables in lexicographic order.
//!
//! The universe of all 4^k k-mers is materialized once, ordered as the
//! Cartesian product with A < C < G < T. Every table always carries all
//! 4^k entries, zero-filled, never sparse: downstream tables align to the
//! enumeration by position, not by key lookup.

use anyhow::{bail, Result};
use log::warn;
use std::collections::HashSet;

use crate::bio;
use crate::error::SequenceError;

/// Largest supported k; the dense table has 4^k entries.
pub const MAX_K: usize = 16;

/// 2-bit code of a base: A=0, C=1, G=2, T=3.
///
/// Integer order over packed codes is exactly the lexicographic order of
/// the words, so table indices double as lexicographic ranks.
#[inline]
pub fn base_code(base: u8) -> Option<u64> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Pack an ACGT word into its table index. None if any base is not ACGT.
pub fn encode_kmer(word: &[u8]) -> Option<u64> {
    word.iter()
        .try_fold(0u64, |acc, &b| base_code(b).map(|c| (acc << 2) | c))
}

/// Inverse of [`encode_kmer`].
pub fn decode_kmer(code: u64, k: usize) -> Vec<u8> {
    let mut word = vec![0u8; k];
    let mut x = code;
    for slot in word.iter_mut().rev() {
        *slot = b"ACGT"[(x & 3) as usize];
        x >>= 2;
    }
    word
}

/// Reverse complement in code space.
pub fn revcomp_code(code: u64, k: usize) -> u64 {
    let mut rc = 0u64;
    let mut x = code;
    for _ in 0..k {
        rc = (rc << 2) | ((x & 3) ^ 3);
        x >>= 2;
    }
    rc
}

/// Occurrence counts for every k-mer of a fixed length, in lexicographic
/// order.
#[derive(Debug, Clone)]
pub struct KmerCounts {
    k: usize,
    counts: Vec<u64>,
}

impl KmerCounts {
    /// A zero-filled table over the full 4^k universe.
    pub fn zeros(k: usize) -> Result<Self> {
        if k == 0 || k > MAX_K {
            bail!("unsupported k-mer length {k}: must be between 1 and {MAX_K}");
        }
        Ok(KmerCounts {
            k,
            counts: vec![0; 1usize << (2 * k)],
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn get(&self, index: u64) -> u64 {
        self.counts[index as usize]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sum of counts over a set of table indices.
    pub fn sum_indices(&self, indices: &[u64]) -> u64 {
        indices.iter().map(|&i| self.counts[i as usize]).sum()
    }

    /// (word, count) pairs in lexicographic order.
    pub fn iter_words(&self) -> impl Iterator<Item = (Vec<u8>, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (decode_kmer(i as u64, self.k), c))
    }

    /// Scan a sequence into the table with a rolling 2-bit window.
    ///
    /// A window is counted only once `k` consecutive ACGT bases have been
    /// seen; any non-ACGT byte resets the run, so no counted word ever
    /// spans such a byte.
    pub fn add_sequence(&mut self, seq: &[u8]) {
        let k = self.k;
        let mask = (1u64 << (2 * k)) - 1;
        let mut code = 0u64;
        let mut run = 0usize;
        for &b in seq {
            match base_code(b) {
                Some(c) => {
                    code = ((code << 2) | c) & mask;
                    run += 1;
                    if run >= k {
                        self.counts[code as usize] += 1;
                    }
                }
                None => {
                    run = 0;
                    code = 0;
                }
            }
        }
    }
}

/// Count all k-mers of a single sequence.
///
/// With `include_reverse_complement`, the reverse-complement strand is
/// scanned into the same pooled table; the strand break behaves like a
/// non-ACGT sentinel (the rolling run resets), so no counted word spans
/// both strands.
pub fn count_kmers(seq: &[u8], k: usize, include_reverse_complement: bool) -> Result<KmerCounts> {
    let mut table = KmerCounts::zeros(k)?;
    if seq.len() < k {
        return Err(SequenceError::TooShort {
            length: seq.len(),
            minimum: k,
        }
        .into());
    }
    table.add_sequence(seq);
    if include_reverse_complement {
        table.add_sequence(&bio::reverse_complement(seq));
    }
    Ok(table)
}

/// Table indices of every k-mer equal to its own reverse complement, in
/// lexicographic order.
///
/// Odd k always yields an empty set: the middle base would have to equal
/// its own complement, which no base does, so odd-length self-palindromes
/// cannot exist and are deliberately excluded.
pub fn all_palindromes(k: usize) -> Result<Vec<u64>> {
    if k == 0 || k > MAX_K {
        bail!("unsupported k-mer length {k}: must be between 1 and {MAX_K}");
    }
    if k % 2 == 1 {
        return Ok(Vec::new());
    }
    let half = k / 2;
    // The first half determines the word; increasing half codes give
    // increasing full codes, so the output is already sorted.
    Ok((0..(1u64 << (2 * half)))
        .map(|h| (h << (2 * half)) | revcomp_code(h, half))
        .collect())
}

/// Table indices for a list of target words of length k.
///
/// Words of the wrong length or containing non-ACGT characters are
/// skipped with a warning; the result is deduplicated and sorted.
pub fn target_indices(words: &[String], k: usize) -> Vec<u64> {
    let mut indices: Vec<u64> = words
        .iter()
        .filter_map(|w| {
            if w.len() != k {
                return None;
            }
            match encode_kmer(w.as_bytes()) {
                Some(code) => Some(code),
                None => {
                    warn!("target word '{w}' contains non-ACGT characters; skipping");
                    None
                }
            }
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Start positions of every occurrence of a word from `codes` (all of
/// length k), ascending. Windows touching a non-ACGT byte never match.
pub fn word_positions(seq: &[u8], k: usize, codes: &HashSet<u64>) -> Vec<usize> {
    if k == 0 || k > MAX_K || seq.len() < k {
        return Vec::new();
    }
    let mask = (1u64 << (2 * k)) - 1;
    let mut code = 0u64;
    let mut run = 0usize;
    let mut positions = Vec::new();
    for (i, &b) in seq.iter().enumerate() {
        match base_code(b) {
            Some(c) => {
                code = ((code << 2) | c) & mask;
                run += 1;
                if run >= k && codes.contains(&code) {
                    positions.push(i + 1 - k);
                }
            }
            None => {
                run = 0;
                code = 0;
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_kmers_example() {
        // ATGC, k=2: AT=1, TG=1, GC=1, all 13 others 0.
        let table = count_kmers(b"ATGC", 2, false).unwrap();
        assert_eq!(table.len(), 16);
        assert_eq!(table.get(encode_kmer(b"AT").unwrap()), 1);
        assert_eq!(table.get(encode_kmer(b"TG").unwrap()), 1);
        assert_eq!(table.get(encode_kmer(b"GC").unwrap()), 1);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn test_count_kmers_lexicographic_order() {
        let table = count_kmers(b"ACGT", 1, false).unwrap();
        let words: Vec<Vec<u8>> = table.iter_words().map(|(w, _)| w).collect();
        assert_eq!(words, vec![b"A".to_vec(), b"C".to_vec(), b"G".to_vec(), b"T".to_vec()]);
    }

    #[test]
    fn test_count_kmers_total_is_l_minus_k_plus_1() {
        let seq = b"ACGTACGTACGTAACCGGTT";
        for k in 1..=6 {
            let table = count_kmers(seq, k, false).unwrap();
            assert_eq!(table.total() as usize, seq.len() - k + 1, "k={k}");
        }
    }

    #[test]
    fn test_count_kmers_skips_non_acgt_windows() {
        // ACGTNACGT, k=4: only the two clean windows count.
        let table = count_kmers(b"ACGTNACGT", 4, false).unwrap();
        assert_eq!(table.total(), 2);
        assert_eq!(table.get(encode_kmer(b"ACGT").unwrap()), 2);
    }

    #[test]
    fn test_count_kmers_with_reverse_complement_pools() {
        let table = count_kmers(b"AACC", 2, true).unwrap();
        // Forward: AA, AC, CC. Reverse complement GGTT: GG, GT, TT.
        assert_eq!(table.total(), 6);
        assert_eq!(table.get(encode_kmer(b"AA").unwrap()), 1);
        assert_eq!(table.get(encode_kmer(b"GG").unwrap()), 1);
        assert_eq!(table.get(encode_kmer(b"TT").unwrap()), 1);
    }

    #[test]
    fn test_count_kmers_too_short() {
        let err = count_kmers(b"ACG", 4, false).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_count_kmers_rejects_bad_k() {
        assert!(count_kmers(b"ACGT", 0, false).is_err());
        assert!(count_kmers(b"ACGT", MAX_K + 1, false).is_err());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for word in [&b"A"[..], b"ACGT", b"TTTT", b"GATTAC"] {
            let code = encode_kmer(word).unwrap();
            assert_eq!(decode_kmer(code, word.len()), word);
        }
        assert_eq!(encode_kmer(b"ACNT"), None);
    }

    #[test]
    fn test_revcomp_code_matches_sequence_revcomp() {
        let word = b"AACGTG";
        let code = encode_kmer(word).unwrap();
        let rc = revcomp_code(code, word.len());
        assert_eq!(decode_kmer(rc, word.len()), bio::reverse_complement(word));
    }

    #[test]
    fn test_all_palindromes_even() {
        let pals = all_palindromes(2).unwrap();
        let words: Vec<Vec<u8>> = pals.iter().map(|&c| decode_kmer(c, 2)).collect();
        assert_eq!(
            words,
            vec![b"AT".to_vec(), b"CG".to_vec(), b"GC".to_vec(), b"TA".to_vec()]
        );
        // 4^(k/2) palindromes for even k.
        assert_eq!(all_palindromes(4).unwrap().len(), 16);
        assert_eq!(all_palindromes(6).unwrap().len(), 64);
    }

    #[test]
    fn test_all_palindromes_odd_is_empty() {
        assert!(all_palindromes(1).unwrap().is_empty());
        assert!(all_palindromes(3).unwrap().is_empty());
        assert!(all_palindromes(5).unwrap().is_empty());
    }

    #[test]
    fn test_all_palindromes_contains_ecori_site() {
        let pals = all_palindromes(6).unwrap();
        let gaattc = encode_kmer(b"GAATTC").unwrap();
        assert!(pals.binary_search(&gaattc).is_ok());
    }

    #[test]
    fn test_target_indices_filters_bad_words() {
        let words = vec![
            "ACGT".to_string(),
            "ACG".to_string(),  // wrong length
            "ACNT".to_string(), // ambiguous
            "ACGT".to_string(), // duplicate
        ];
        let indices = target_indices(&words, 4);
        assert_eq!(indices, vec![encode_kmer(b"ACGT").unwrap()]);
    }

    #[test]
    fn test_word_positions() {
        let codes: HashSet<u64> = [encode_kmer(b"GAATTC").unwrap()].into_iter().collect();
        assert_eq!(word_positions(b"AAGAATTCGGAATTC", 6, &codes), vec![2, 9]);
        assert_eq!(word_positions(b"GANTTC", 6, &codes), Vec::<usize>::new());
    }
}
