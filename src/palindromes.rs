//! Exact reverse-complement palindrome detection and windowed density.

use serde::Serialize;

use crate::bio::{self, kmers};
use crate::windows::sliding_windows;

/// Start positions whose k-length window equals its own reverse
/// complement, ascending.
///
/// Windows containing a non-ACGT base are skipped: an ambiguous base has
/// no defined complement, so it can never anchor a palindrome.
pub fn palindrome_positions(seq: &[u8], k: usize) -> Vec<usize> {
    if k == 0 || seq.len() < k {
        return Vec::new();
    }
    if k > kmers::MAX_K {
        return palindrome_positions_naive(seq, k);
    }
    let shift = 2 * (k - 1);
    let mask = (1u64 << (2 * k)) - 1;
    let mut fwd = 0u64;
    let mut rc = 0u64;
    let mut run = 0usize;
    let mut positions = Vec::new();
    for (i, &b) in seq.iter().enumerate() {
        match kmers::base_code(b) {
            Some(c) => {
                fwd = ((fwd << 2) | c) & mask;
                rc = (rc >> 2) | ((c ^ 3) << shift);
                run += 1;
                if run >= k && fwd == rc {
                    positions.push(i + 1 - k);
                }
            }
            None => {
                run = 0;
                fwd = 0;
                rc = 0;
            }
        }
    }
    positions
}

// Fallback for k beyond the packed-code range.
fn palindrome_positions_naive(seq: &[u8], k: usize) -> Vec<usize> {
    seq.windows(k)
        .enumerate()
        .filter(|(_, w)| w.iter().all(|&b| bio::is_acgt(b)) && bio::reverse_complement(w) == *w)
        .map(|(i, _)| i)
        .collect()
}

/// Palindrome density and GC fraction for one sliding window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowDensity {
    pub start: usize,
    pub density: f64,
    pub gc: f64,
}

/// Palindrome density per sliding window: the number of palindrome start
/// positions inside [start, start+window) divided by the window size,
/// together with the window's GC fraction.
pub fn palindrome_density(seq: &[u8], k: usize, window: usize, step: usize) -> Vec<WindowDensity> {
    let positions = palindrome_positions(seq, k);
    sliding_windows(seq.len(), window, step)
        .into_iter()
        .map(|w| {
            let lo = positions.partition_point(|&p| p < w.start);
            let hi = positions.partition_point(|&p| p < w.end);
            WindowDensity {
                start: w.start,
                density: (hi - lo) as f64 / window as f64,
                gc: bio::gc_count(&seq[w.start..w.end]) as f64 / window as f64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palindrome_positions_simple() {
        // GAATTC is its own reverse complement.
        assert_eq!(palindrome_positions(b"AAGAATTCAA", 6), vec![2]);
        assert_eq!(palindrome_positions(b"ACGT", 4), vec![0]);
    }

    #[test]
    fn test_palindrome_positions_overlapping() {
        // ATAT: AT at 0 and 2, TA at 1.
        assert_eq!(palindrome_positions(b"ATAT", 2), vec![0, 1, 2]);
    }

    #[test]
    fn test_palindrome_positions_skip_ambiguous() {
        assert_eq!(palindrome_positions(b"GANTTC", 6), Vec::<usize>::new());
        assert_eq!(palindrome_positions(b"NNNN", 4), Vec::<usize>::new());
    }

    #[test]
    fn test_palindrome_positions_odd_k_finds_nothing() {
        assert_eq!(palindrome_positions(b"ACGTACGT", 3), Vec::<usize>::new());
    }

    #[test]
    fn test_palindrome_positions_naive_agrees() {
        let seq = b"AAGAATTCATATACGCGT";
        assert_eq!(
            palindrome_positions(seq, 4),
            palindrome_positions_naive(seq, 4)
        );
    }

    #[test]
    fn test_palindrome_density_windows() {
        // ACGTAAAA: palindrome ACGT at 0 only.
        let rows = palindrome_density(b"ACGTAAAA", 4, 4, 2);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].start, 0);
        assert!((rows[0].density - 0.25).abs() < 1e-12);
        assert!((rows[0].gc - 0.5).abs() < 1e-12);
        assert_eq!(rows[1].density, 0.0);
        assert_eq!(rows[2].gc, 0.0);
    }

    #[test]
    fn test_palindrome_density_short_sequence_is_empty() {
        assert!(palindrome_density(b"ACG", 4, 10, 2).is_empty());
    }
}
