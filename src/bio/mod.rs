//! Base-level DNA sequence utilities shared by every analysis.

pub mod ambiguity;
pub mod codons;
pub mod kmers;
pub mod orient;

pub use orient::Orientation;

/// Watson-Crick complement of a single base (A↔T, C↔G, case-preserving).
///
/// Unrecognized characters pass through unchanged; callers that need strict
/// ACGT input filter before complementing.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

/// Reverse complement of a DNA sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Checks if a byte is one of A, C, G, T. Case-insensitive.
#[inline]
pub fn is_acgt(base: u8) -> bool {
    matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T')
}

/// Number of G or C bases in a sequence.
pub fn gc_count(seq: &[u8]) -> usize {
    seq.iter()
        .filter(|&&b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
        .count()
}
