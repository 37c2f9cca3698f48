//! IUPAC ambiguity-code expansion.

use itertools::Itertools;

use crate::error::SequenceError;

/// Concrete alternatives for one IUPAC code, in lexicographic base order.
/// `X` is treated like `N`; a gap expands to itself.
pub fn alternatives(code: u8) -> Option<&'static [u8]> {
    let bases: &[u8] = match code.to_ascii_uppercase() {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'S' => b"CG",
        b'W' => b"AT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        b'N' | b'X' => b"ACGT",
        b'-' => b"-",
        _ => return None,
    };
    Some(bases)
}

/// Expand a degenerate sequence into every concrete sequence consistent
/// with it: the Cartesian product of the per-position alternatives, in
/// lexicographic order. The number of expansions is the product of the
/// per-position alternative counts.
pub fn expand_ambiguity(seq: &[u8]) -> Result<Vec<Vec<u8>>, SequenceError> {
    if seq.is_empty() {
        return Ok(vec![Vec::new()]);
    }
    let pools: Vec<&'static [u8]> = seq
        .iter()
        .map(|&b| {
            alternatives(b).ok_or_else(|| {
                SequenceError::malformed(format!("unknown IUPAC code '{}'", b as char))
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(pools
        .iter()
        .map(|p| p.iter().copied())
        .multi_cartesian_product()
        .collect())
}
