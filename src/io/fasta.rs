//! FASTA reading and writing on top of needletail.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use needletail::parse_fastx_file;
use std::io::Write;
use std::path::Path;

use crate::bio;

/// Width of sequence lines written by [`write_fasta`].
const FASTA_LINE_WIDTH: usize = 70;

/// All records of a FASTA file as (id, uppercase sequence) pairs, in file
/// order. The id is the header up to the first whitespace.
pub fn read_fasta(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("failed to open FASTA file {}", path.display()))?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record =
            record.with_context(|| format!("invalid record in {}", path.display()))?;
        let id = String::from_utf8_lossy(record.id())
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        let seq: Vec<u8> = record.seq().iter().map(u8::to_ascii_uppercase).collect();
        records.push((id, seq));
    }
    Ok(records)
}

/// Contig lengths in file order, keyed by id.
pub fn read_lengths(path: &Path) -> Result<IndexMap<String, usize>> {
    let mut lengths = IndexMap::new();
    for (id, seq) in read_fasta(path)? {
        lengths.insert(id, seq.len());
    }
    Ok(lengths)
}

/// A plasmid as one uppercase sequence: all records of the file
/// concatenated in order, with every base outside ACGT normalized to `N`.
///
/// The `N` boundary between concatenated records keeps k-mer windows from
/// spanning two contigs.
pub fn read_plasmid_sequence(path: &Path) -> Result<Vec<u8>> {
    let records = read_fasta(path)?;
    let mut seq = Vec::with_capacity(records.iter().map(|(_, s)| s.len() + 1).sum());
    for (i, (_, record_seq)) in records.iter().enumerate() {
        if i > 0 {
            seq.push(b'N');
        }
        seq.extend(
            record_seq
                .iter()
                .map(|&b| if bio::is_acgt(b) { b } else { b'N' }),
        );
    }
    Ok(seq)
}

/// Write records as FASTA with fixed-width sequence lines.
pub fn write_fasta<W: Write>(writer: &mut W, records: &[(String, Vec<u8>)]) -> Result<()> {
    for (id, seq) in records {
        writeln!(writer, ">{id}")?;
        for line in seq.chunks(FASTA_LINE_WIDTH) {
            writer.write_all(line)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn fasta_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".fasta")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_fasta_ids_and_upper() {
        let file = fasta_file(">p1 some description\nacgt\nACGT\n>p2\nTTTT\n");
        let records = read_fasta(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "p1");
        assert_eq!(records[0].1, b"ACGTACGT");
        assert_eq!(records[1].0, "p2");
    }

    #[test]
    fn test_read_lengths_preserves_order() {
        let file = fasta_file(">b\nACGTAC\n>a\nACG\n");
        let lengths = read_lengths(file.path()).unwrap();
        assert_eq!(
            lengths.iter().map(|(k, &v)| (k.as_str(), v)).collect::<Vec<_>>(),
            vec![("b", 6), ("a", 3)]
        );
    }

    #[test]
    fn test_read_plasmid_sequence_joins_with_n() {
        let file = fasta_file(">c1\nACGT\n>c2\nTTRA\n");
        let seq = read_plasmid_sequence(file.path()).unwrap();
        // Records joined by N; the ambiguous R normalized to N.
        assert_eq!(seq, b"ACGTNTTNA");
    }

    #[test]
    fn test_write_fasta_roundtrip() {
        let records = vec![("plasmid".to_string(), vec![b'A'; 75])];
        let mut buf = Vec::new();
        write_fasta(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(">plasmid"));
        assert_eq!(lines.next().map(str::len), Some(70));
        assert_eq!(lines.next().map(str::len), Some(5));
    }

    #[test]
    fn test_read_fasta_missing_file_is_error() {
        assert!(read_fasta(Path::new("/nonexistent/x.fasta")).is_err());
    }
}
