//! Orientation of circular plasmid sequences by leading region.
//!
//! The leading region is the part of a conjugative plasmid transferred
//! first; its annotation gives a 1-indexed start coordinate and a transfer
//! direction. Orienting rotates the circular sequence so the leading
//! region starts at position 0, on the strand read 5'->3'.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bio;
use crate::error::SequenceError;

/// Transfer direction of the leading region relative to its start
/// coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Downstream,
    Upstream,
}

impl FromStr for Orientation {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "downstream" => Ok(Orientation::Downstream),
            "upstream" => Ok(Orientation::Upstream),
            other => Err(SequenceError::malformed(format!(
                "unknown orientation '{other}': expected 'upstream' or 'downstream'"
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Downstream => write!(f, "downstream"),
            Orientation::Upstream => write!(f, "upstream"),
        }
    }
}

/// Rotate a circular sequence so the leading region starts at position 0.
///
/// `start` is 1-indexed. Downstream is a pure rotation: the base at
/// `start` becomes the first base. Upstream flips to the complement
/// strand: the region before `start`, read 5'->3' on the complement,
/// becomes the new leading end. Both branches preserve length.
pub fn orient_by_leading_region(
    seq: &[u8],
    start: usize,
    orientation: Orientation,
) -> Result<Vec<u8>, SequenceError> {
    if seq.is_empty() {
        return Ok(Vec::new());
    }
    if start == 0 || start > seq.len() {
        return Err(SequenceError::malformed(format!(
            "leading-region start {start} outside sequence of length {}",
            seq.len()
        )));
    }
    let pivot = start - 1;
    let oriented = match orientation {
        Orientation::Downstream => {
            let mut out = seq[pivot..].to_vec();
            out.extend_from_slice(&seq[..pivot]);
            out
        }
        Orientation::Upstream => {
            let mut out = bio::reverse_complement(&seq[..pivot]);
            out.extend_from_slice(&bio::reverse_complement(&seq[pivot..]));
            out
        }
    };
    debug_assert_eq!(oriented.len(), seq.len());
    Ok(oriented)
}

/// First and last `size` bases of the oriented sequence. For sequences
/// shorter than `size` the two halves are the whole sequence.
pub fn leading_and_lagging(
    seq: &[u8],
    start: usize,
    orientation: Orientation,
    size: usize,
) -> Result<(Vec<u8>, Vec<u8>), SequenceError> {
    let oriented = orient_by_leading_region(seq, start, orientation)?;
    let lead_end = size.min(oriented.len());
    let lag_start = oriented.len().saturating_sub(size);
    Ok((oriented[..lead_end].to_vec(), oriented[lag_start..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_is_rotation() {
        let out = orient_by_leading_region(b"ABCDEFGH", 3, Orientation::Downstream).unwrap();
        assert_eq!(out, b"CDEFGHAB");
    }

    #[test]
    fn test_start_one_downstream_is_identity() {
        let out = orient_by_leading_region(b"ACGTACGT", 1, Orientation::Downstream).unwrap();
        assert_eq!(out, b"ACGTACGT");
    }

    #[test]
    fn test_upstream_complements_both_parts() {
        // rc("AA") + rc("CGT") = "TT" + "ACG"
        let out = orient_by_leading_region(b"AACGT", 3, Orientation::Upstream).unwrap();
        assert_eq!(out, b"TTACG");
    }

    #[test]
    fn test_orientation_preserves_length() {
        let seq = b"ACGTACGTAACC";
        for start in 1..=seq.len() {
            for orientation in [Orientation::Downstream, Orientation::Upstream] {
                let out = orient_by_leading_region(seq, start, orientation).unwrap();
                assert_eq!(out.len(), seq.len());
            }
        }
    }

    #[test]
    fn test_start_out_of_range() {
        assert!(orient_by_leading_region(b"ACGT", 0, Orientation::Downstream).is_err());
        assert!(orient_by_leading_region(b"ACGT", 5, Orientation::Downstream).is_err());
    }

    #[test]
    fn test_orientation_from_str() {
        assert_eq!(
            " Downstream ".parse::<Orientation>().unwrap(),
            Orientation::Downstream
        );
        assert_eq!(
            "upstream".parse::<Orientation>().unwrap(),
            Orientation::Upstream
        );
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_leading_and_lagging() {
        let (lead, lag) = leading_and_lagging(b"ABCDEFGH", 1, Orientation::Downstream, 3).unwrap();
        assert_eq!(lead, b"ABC");
        assert_eq!(lag, b"FGH");

        // Shorter than size: both halves are the whole sequence.
        let (lead, lag) = leading_and_lagging(b"ACGT", 1, Orientation::Downstream, 10).unwrap();
        assert_eq!(lead, b"ACGT");
        assert_eq!(lag, b"ACGT");
    }
}
