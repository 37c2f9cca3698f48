//! Command-line interface: one subcommand per analysis.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::bio::ambiguity::expand_ambiguity;
use crate::bio::codons::{codon_usage, compute_cai};
use crate::bio::kmers::{count_kmers, target_indices, word_positions};
use crate::bio::orient::{leading_and_lagging, orient_by_leading_region};
use crate::io::{self, fasta, LeadingReportRow};
use crate::metadata::{load_plasmid_table, PlasmidInfo, PlasmidTable};
use crate::palindromes::{palindrome_density, palindrome_positions};
use crate::stats::markov::positional_enrichment;
use crate::stats::{compare_score_tables, load_score_table};
use crate::windows::{bin_hit_density, sliding_windows, BinDensity};

#[derive(Parser)]
#[command(name = "plasmid_kmer_stats", version, about = "K-mer and palindrome statistics for conjugative plasmids")]
pub struct Cli {
    /// Worker threads for batch subcommands (0 = rayon default).
    #[arg(long, global = true, default_value_t = 0)]
    pub threads: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count all k-mers of one FASTA file into a full lexicographic table.
    CountKmers {
        #[arg(long)]
        fasta: PathBuf,
        #[arg(short)]
        k: usize,
        /// Pool counts from the reverse-complement strand into the same table.
        #[arg(long)]
        rev_comp: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rotate each annotated plasmid so its leading region starts first.
    Orient {
        #[arg(long)]
        fasta_dir: PathBuf,
        /// Tab-delimited annotation table with a `Leading Region` column.
        #[arg(long)]
        regions: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Write the leading and lagging ends of each annotated plasmid.
    Split {
        #[arg(long)]
        fasta_dir: PathBuf,
        #[arg(long)]
        regions: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        /// Bases taken from each end of the oriented sequence.
        #[arg(long, default_value_t = 5000)]
        size: usize,
    },
    /// GC content and palindrome density of leading region vs the rest.
    LeadingReport {
        #[arg(long)]
        fasta_dir: PathBuf,
        #[arg(long)]
        regions: PathBuf,
        #[arg(short, default_value_t = 6)]
        k: usize,
        #[arg(long, default_value_t = 5000)]
        leading_size: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// Palindrome density per sliding window over each oriented plasmid.
    PalindromeDensity {
        #[arg(long)]
        fasta_dir: PathBuf,
        #[arg(long)]
        regions: PathBuf,
        #[arg(short, default_value_t = 6)]
        k: usize,
        #[arg(short, long, default_value_t = 5000)]
        window: usize,
        #[arg(short, long, default_value_t = 100)]
        step: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// PTU-specific target k-mer counts per sliding window.
    TargetWindows {
        #[arg(long)]
        fasta_dir: PathBuf,
        #[arg(long)]
        regions: PathBuf,
        /// Directory of `<PTU>.txt` target-word lists.
        #[arg(long)]
        targets_dir: PathBuf,
        #[arg(short, default_value_t = 6)]
        k: usize,
        #[arg(short, long, default_value_t = 5000)]
        window: usize,
        #[arg(short, long, default_value_t = 500)]
        step: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// Bin inverted-repeat hits from einverted reports along each genome.
    InvertedDensity {
        /// Directory of einverted text reports, one per genome.
        #[arg(long)]
        inv_dir: PathBuf,
        /// Directory of the matching FASTA files (paired by file stem).
        #[arg(long)]
        fasta_dir: PathBuf,
        #[arg(long, default_value_t = 5000)]
        bin_size: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// Compare word-score discrepancies between two groups, targets vs rest.
    Compare {
        /// Leading-group score table (single-pair mode).
        #[arg(long, requires = "group_b", conflicts_with = "score_dir")]
        group_a: Option<PathBuf>,
        /// Lagging-group score table (single-pair mode).
        #[arg(long, requires = "group_a", conflicts_with = "score_dir")]
        group_b: Option<PathBuf>,
        /// Directory of score tables; every `*leading*` CSV is paired with
        /// its `*lagging*` counterpart by file name.
        #[arg(long, required_unless_present = "group_a")]
        score_dir: Option<PathBuf>,
        /// Target word list, one word per line.
        #[arg(long)]
        targets: PathBuf,
        /// Row label in single-pair mode; defaults to the group-a file stem.
        #[arg(long, conflicts_with = "score_dir")]
        label: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Test motif enrichment in the first part of each record against a
    /// Markov background.
    PositionalTest {
        #[arg(long)]
        fasta: PathBuf,
        /// Motif(s), IUPAC codes allowed; repeatable.
        #[arg(long, required = true)]
        motif: Vec<String>,
        #[arg(long, default_value_t = 10000)]
        split_at: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// Expand IUPAC-degenerate sequences into all concrete alternatives.
    Expand {
        /// File of degenerate sequences, one per line.
        #[arg(long)]
        input: PathBuf,
        /// Skip input sequences longer than this many bases.
        #[arg(long)]
        max_len: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Codon Adaptation Index per coding sequence.
    Cai {
        #[arg(long)]
        fasta: PathBuf,
        /// Tab-delimited `codon weight` table.
        #[arg(long)]
        weights: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to configure the thread pool")?;
    }
    match cli.command {
        Commands::CountKmers { fasta, k, rev_comp, output } => {
            run_count_kmers(&fasta, k, rev_comp, output.as_deref())
        }
        Commands::Orient { fasta_dir, regions, output_dir } => {
            run_orient(&fasta_dir, &regions, &output_dir)
        }
        Commands::Split { fasta_dir, regions, output_dir, size } => {
            run_split(&fasta_dir, &regions, &output_dir, size)
        }
        Commands::LeadingReport { fasta_dir, regions, k, leading_size, output } => {
            run_leading_report(&fasta_dir, &regions, k, leading_size, &output)
        }
        Commands::PalindromeDensity { fasta_dir, regions, k, window, step, output } => {
            run_palindrome_density(&fasta_dir, &regions, k, window, step, &output)
        }
        Commands::TargetWindows { fasta_dir, regions, targets_dir, k, window, step, output } => {
            run_target_windows(&fasta_dir, &regions, &targets_dir, k, window, step, &output)
        }
        Commands::InvertedDensity { inv_dir, fasta_dir, bin_size, output } => {
            run_inverted_density(&inv_dir, &fasta_dir, bin_size, &output)
        }
        Commands::Compare { group_a, group_b, score_dir, targets, label, output } => {
            match (group_a, group_b, score_dir) {
                (Some(a), Some(b), None) => {
                    run_compare(&a, &b, &targets, label.as_deref(), output.as_deref())
                }
                (None, None, Some(dir)) => run_compare_dir(&dir, &targets, output.as_deref()),
                _ => bail!("compare needs either --group-a with --group-b, or --score-dir"),
            }
        }
        Commands::PositionalTest { fasta, motif, split_at, output } => {
            run_positional_test(&fasta, &motif, split_at, &output)
        }
        Commands::Expand { input, max_len, output } => {
            run_expand(&input, max_len, output.as_deref())
        }
        Commands::Cai { fasta, weights, output } => {
            run_cai(&fasta, &weights, output.as_deref())
        }
    }
}

/// FASTA files of a directory (.fasta/.fa/.fna), sorted by path.
fn fasta_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| {
                        matches!(e.to_ascii_lowercase().as_str(), "fasta" | "fa" | "fna")
                    })
        })
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no FASTA files in {}", dir.display());
    }
    Ok(files)
}

fn file_stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pair each FASTA file in a directory with its annotation. Files without
/// an annotation row are noted and left out.
fn annotated_files(dir: &Path, table: &PlasmidTable) -> Result<Vec<(PathBuf, String, PlasmidInfo)>> {
    let mut paired = Vec::new();
    for path in fasta_files_in(dir)? {
        let stem = file_stem_name(&path);
        match table.get(&stem) {
            Some(info) => paired.push((path, stem, info.clone())),
            None => info!("'{stem}' has no leading-region annotation; skipping"),
        }
    }
    if paired.is_empty() {
        bail!("no FASTA file in {} matches an annotation row", dir.display());
    }
    Ok(paired)
}

/// Run one fallible job per plasmid in parallel, keeping input order.
/// Failures are logged and dropped; only a fully failed batch is an error.
fn batch<T: Send, I: Send + Sync>(
    jobs: &[I],
    job_name: impl Fn(&I) -> &str + Sync,
    run: impl Fn(&I) -> Result<T> + Sync,
) -> Result<Vec<T>> {
    let results: Vec<Option<T>> = jobs
        .par_iter()
        .map(|job| match run(job) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("'{}' failed: {e:#}", job_name(job));
                None
            }
        })
        .collect();
    let succeeded: Vec<T> = results.into_iter().flatten().collect();
    if succeeded.is_empty() {
        bail!("every input failed; nothing to write");
    }
    Ok(succeeded)
}

fn run_count_kmers(path: &Path, k: usize, rev_comp: bool, output: Option<&Path>) -> Result<()> {
    let seq = fasta::read_plasmid_sequence(path)?;
    let counts = count_kmers(&seq, k, rev_comp)?;
    io::write_kmer_counts(io::output_writer(output)?, &counts)
}

fn run_orient(fasta_dir: &Path, regions: &Path, output_dir: &Path) -> Result<()> {
    let table = load_plasmid_table(regions)?;
    let jobs = annotated_files(fasta_dir, &table)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let written = batch(&jobs, |(_, stem, _)| stem.as_str(), |(path, stem, plasmid_info)| {
        let seq = fasta::read_plasmid_sequence(path)?;
        let region = plasmid_info.region;
        let oriented = orient_by_leading_region(&seq, region.start, region.orientation)?;
        let out_path = output_dir.join(format!("{stem}_oriented.fa"));
        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        fasta::write_fasta(&mut out, &[(stem.clone(), oriented)])?;
        Ok(())
    })?;
    info!("oriented {} of {} plasmids", written.len(), jobs.len());
    Ok(())
}

fn run_split(fasta_dir: &Path, regions: &Path, output_dir: &Path, size: usize) -> Result<()> {
    let table = load_plasmid_table(regions)?;
    let jobs = annotated_files(fasta_dir, &table)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let written = batch(&jobs, |(_, stem, _)| stem.as_str(), |(path, stem, plasmid_info)| {
        let seq = fasta::read_plasmid_sequence(path)?;
        let region = plasmid_info.region;
        let (leading, lagging) =
            leading_and_lagging(&seq, region.start, region.orientation, size)?;
        for (part, part_seq) in [("leading", leading), ("lagging", lagging)] {
            let out_path = output_dir.join(format!("{stem}_{part}_{size}.fa"));
            let mut out = fs::File::create(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            fasta::write_fasta(&mut out, &[(format!("{stem}_{part}"), part_seq)])?;
        }
        Ok(())
    })?;
    info!("split {} of {} plasmids", written.len(), jobs.len());
    Ok(())
}

fn run_leading_report(
    fasta_dir: &Path,
    regions: &Path,
    k: usize,
    leading_size: usize,
    output: &Path,
) -> Result<()> {
    let table = load_plasmid_table(regions)?;
    let jobs = annotated_files(fasta_dir, &table)?;
    let rows = batch(&jobs, |(_, stem, _)| stem.as_str(), |(path, stem, plasmid_info)| {
        let seq = fasta::read_plasmid_sequence(path)?;
        let region = plasmid_info.region;
        let oriented = orient_by_leading_region(&seq, region.start, region.orientation)?;
        let taken = leading_size.min(oriented.len());
        let (leading, rest) = oriented.split_at(taken);
        let gc_fraction = |part: &[u8]| {
            (!part.is_empty()).then(|| crate::bio::gc_count(part) as f64 / part.len() as f64)
        };
        let density = |part: &[u8]| {
            (!part.is_empty())
                .then(|| palindrome_positions(part, k).len() as f64 / part.len() as f64)
        };
        Ok(LeadingReportRow {
            ptu: plasmid_info.ptu_label().to_string(),
            plasmid: stem.clone(),
            plasmid_length: oriented.len(),
            leading_region_taken: taken,
            leading_region_gc: io::na(gc_fraction(leading)),
            rest_of_plasmid_gc: io::na(gc_fraction(rest)),
            leading_region_density: io::na(density(leading)),
            rest_plasmid_density: io::na(density(rest)),
        })
    })?;
    io::write_rows(io::output_writer(Some(output))?, b',', &LeadingReportRow::HEADER, &rows)
}

#[derive(Serialize)]
struct PalindromeWindowRow {
    ptu: String,
    plasmid: String,
    start: usize,
    density: f64,
    gc: f64,
}

impl PalindromeWindowRow {
    const HEADER: [&'static str; 5] = ["ptu", "plasmid", "start", "density", "gc"];
}

fn run_palindrome_density(
    fasta_dir: &Path,
    regions: &Path,
    k: usize,
    window: usize,
    step: usize,
    output: &Path,
) -> Result<()> {
    let table = load_plasmid_table(regions)?;
    let jobs = annotated_files(fasta_dir, &table)?;
    let per_plasmid = batch(&jobs, |(_, stem, _)| stem.as_str(), |(path, stem, plasmid_info)| {
        let seq = fasta::read_plasmid_sequence(path)?;
        let region = plasmid_info.region;
        let oriented = orient_by_leading_region(&seq, region.start, region.orientation)?;
        let rows: Vec<PalindromeWindowRow> = palindrome_density(&oriented, k, window, step)
            .into_iter()
            .map(|w| PalindromeWindowRow {
                ptu: plasmid_info.ptu_label().to_string(),
                plasmid: stem.clone(),
                start: w.start,
                density: w.density,
                gc: w.gc,
            })
            .collect();
        Ok(rows)
    })?;
    let rows: Vec<PalindromeWindowRow> = per_plasmid.into_iter().flatten().collect();
    io::write_rows(io::output_writer(Some(output))?, b',', &PalindromeWindowRow::HEADER, &rows)
}

#[derive(Serialize)]
struct TargetWindowRow {
    plasmid: String,
    ptu: String,
    start: usize,
    count: usize,
}

impl TargetWindowRow {
    const HEADER: [&'static str; 4] = ["plasmid", "ptu", "start", "count"];
}

fn run_target_windows(
    fasta_dir: &Path,
    regions: &Path,
    targets_dir: &Path,
    k: usize,
    window: usize,
    step: usize,
    output: &Path,
) -> Result<()> {
    let table = load_plasmid_table(regions)?;
    let jobs = annotated_files(fasta_dir, &table)?;
    let per_plasmid = batch(&jobs, |(_, stem, _)| stem.as_str(), |(path, stem, plasmid_info)| {
        let ptu = plasmid_info.ptu_label();
        let target_path = targets_dir.join(format!("{ptu}.txt"));
        if !target_path.is_file() {
            bail!("no target list {} for PTU '{ptu}'", target_path.display());
        }
        let words = io::load_target_words(&target_path)?;
        let codes: HashSet<u64> = target_indices(&words, k).into_iter().collect();
        if codes.is_empty() {
            bail!("target list for PTU '{ptu}' has no usable {k}-mer");
        }
        let seq = fasta::read_plasmid_sequence(path)?;
        let region = plasmid_info.region;
        let oriented = orient_by_leading_region(&seq, region.start, region.orientation)?;
        let positions = word_positions(&oriented, k, &codes);
        let rows: Vec<TargetWindowRow> = sliding_windows(oriented.len(), window, step)
            .into_iter()
            .map(|w| {
                let lo = positions.partition_point(|&p| p < w.start);
                let hi = positions.partition_point(|&p| p < w.end);
                TargetWindowRow {
                    plasmid: stem.clone(),
                    ptu: ptu.to_string(),
                    start: w.start,
                    count: hi - lo,
                }
            })
            .collect();
        Ok(rows)
    })?;
    let rows: Vec<TargetWindowRow> = per_plasmid.into_iter().flatten().collect();
    io::write_rows(io::output_writer(Some(output))?, b',', &TargetWindowRow::HEADER, &rows)
}

fn run_inverted_density(
    inv_dir: &Path,
    fasta_dir: &Path,
    bin_size: usize,
    output: &Path,
) -> Result<()> {
    let fastas: Vec<PathBuf> = fasta_files_in(fasta_dir)?;
    let by_stem: std::collections::HashMap<String, &PathBuf> =
        fastas.iter().map(|p| (file_stem_name(p), p)).collect();

    let mut reports: Vec<PathBuf> = fs::read_dir(inv_dir)
        .with_context(|| format!("failed to read directory {}", inv_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    reports.sort();

    let matched_stems: HashSet<String> =
        reports.iter().map(|p| file_stem_name(p)).collect();
    for path in &fastas {
        let stem = file_stem_name(path);
        if !matched_stems.contains(&stem) {
            warn!("FASTA '{stem}' has no einverted report in {}", inv_dir.display());
        }
    }

    let jobs: Vec<(PathBuf, String, PathBuf)> = reports
        .into_iter()
        .filter_map(|report| {
            let stem = file_stem_name(&report);
            match by_stem.get(&stem) {
                Some(fasta_path) => Some((report, stem, (*fasta_path).clone())),
                None => {
                    warn!("report '{stem}' has no FASTA in {}", fasta_dir.display());
                    None
                }
            }
        })
        .collect();
    if jobs.is_empty() {
        bail!("no einverted report in {} matches a FASTA", inv_dir.display());
    }

    let per_genome = batch(&jobs, |(_, stem, _)| stem.as_str(), |(report, stem, fasta_path)| {
        let text = fs::read_to_string(report)
            .with_context(|| format!("failed to read {}", report.display()))?;
        let hits = io::einverted::parse_einverted_text(&text);
        let lengths = fasta::read_lengths(fasta_path)?;
        Ok(bin_hit_density(&hits, &lengths, stem, bin_size))
    })?;
    let rows: Vec<BinDensity> = per_genome.into_iter().flatten().collect();
    io::write_rows(io::output_writer(Some(output))?, b'\t', &BinDensity::HEADER, &rows)
}

#[derive(Serialize)]
struct ComparisonRow {
    label: String,
    median_discrepancy_targets: String,
    median_discrepancy_others: String,
    statistic: String,
    p_value: String,
}

impl ComparisonRow {
    const HEADER: [&'static str; 5] = [
        "label",
        "median_discrepancy_targets",
        "median_discrepancy_others",
        "statistic",
        "p_value",
    ];
}

fn comparison_row(
    group_a: &Path,
    group_b: &Path,
    words: &[String],
    label: &str,
) -> Result<ComparisonRow> {
    let a = load_score_table(group_a)?;
    let b = load_score_table(group_b)?;
    let summary = compare_score_tables(&a, &b, words, label);
    Ok(ComparisonRow {
        label: summary.label,
        median_discrepancy_targets: io::na(summary.median_discrepancy_targets),
        median_discrepancy_others: io::na(summary.median_discrepancy_others),
        statistic: io::na(summary.statistic),
        p_value: io::na(summary.p_value),
    })
}

fn run_compare(
    group_a: &Path,
    group_b: &Path,
    targets: &Path,
    label: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let words = io::load_target_words(targets)?;
    let label = label
        .map(str::to_string)
        .unwrap_or_else(|| file_stem_name(group_a));
    let row = comparison_row(group_a, group_b, &words, &label)?;
    io::write_rows(io::output_writer(output)?, b',', &ComparisonRow::HEADER, &[row])
}

/// Pair every `*leading*` score table in a directory with its `*lagging*`
/// counterpart by file name. A leading table without one is skipped with
/// a warning naming the missing file.
fn leading_lagging_pairs(dir: &Path) -> Result<Vec<(PathBuf, PathBuf, String)>> {
    let mut leading: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
                && file_stem_name(p).contains("leading")
        })
        .collect();
    leading.sort();
    if leading.is_empty() {
        bail!("no leading score table in {}", dir.display());
    }
    let mut pairs = Vec::new();
    for lead in leading {
        let stem = file_stem_name(&lead);
        let lagging_name = format!("{}.csv", stem.replacen("leading", "lagging", 1));
        let lagging = dir.join(&lagging_name);
        if lagging.is_file() {
            pairs.push((lead, lagging, stem));
        } else {
            warn!("'{stem}' has no lagging counterpart '{lagging_name}'; skipping");
        }
    }
    if pairs.is_empty() {
        bail!(
            "no leading score table in {} has a lagging counterpart",
            dir.display()
        );
    }
    Ok(pairs)
}

fn run_compare_dir(dir: &Path, targets: &Path, output: Option<&Path>) -> Result<()> {
    let words = io::load_target_words(targets)?;
    let pairs = leading_lagging_pairs(dir)?;
    let rows = batch(&pairs, |(_, _, label)| label.as_str(), |(lead, lag, label)| {
        comparison_row(lead, lag, &words, label)
    })?;
    io::write_rows(io::output_writer(output)?, b',', &ComparisonRow::HEADER, &rows)
}

#[derive(Serialize)]
struct PositionalRow {
    id: String,
    length: usize,
    expected_a: f64,
    expected_b: f64,
    observed_a: u64,
    observed_b: u64,
    p_expected_a: String,
    p_value: String,
    delta_l: f64,
}

impl PositionalRow {
    const HEADER: [&'static str; 9] = [
        "id",
        "length",
        "expected_a",
        "expected_b",
        "observed_a",
        "observed_b",
        "p_expected_a",
        "p_value",
        "delta_l",
    ];
}

fn run_positional_test(
    fasta_path: &Path,
    motifs: &[String],
    split_at: usize,
    output: &Path,
) -> Result<()> {
    let mut words: Vec<Vec<u8>> = Vec::new();
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    for motif in motifs {
        for word in expand_ambiguity(motif.to_ascii_uppercase().as_bytes())? {
            if seen.insert(word.clone()) {
                words.push(word);
            }
        }
    }
    let records = fasta::read_fasta(fasta_path)?;
    if records.is_empty() {
        bail!("no records in {}", fasta_path.display());
    }
    let rows = batch(&records, |(id, _)| id.as_str(), |(id, seq)| {
        let test = positional_enrichment(seq, &words, split_at)?;
        Ok(PositionalRow {
            id: id.clone(),
            length: seq.len(),
            expected_a: test.expected_a,
            expected_b: test.expected_b,
            observed_a: test.observed_a,
            observed_b: test.observed_b,
            p_expected_a: io::na(test.p_expected_a),
            p_value: io::na(test.p_value),
            delta_l: test.delta_l,
        })
    })?;
    io::write_rows(io::output_writer(Some(output))?, b',', &PositionalRow::HEADER, &rows)
}

/// Strip decoration characters carried by motif lists copied from
/// annotation sources.
fn clean_motif(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            !c.is_whitespace() && !c.is_ascii_digit() && !matches!(c, '(' | ')' | '/' | '^' | ',' | '?')
        })
        .collect()
}

fn run_expand(input: &Path, max_len: Option<usize>, output: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let mut out = io::output_writer(output)?;
    let mut expanded_any = false;
    for raw in text.lines() {
        let motif = clean_motif(raw);
        if motif.is_empty() {
            continue;
        }
        if let Some(limit) = max_len {
            if motif.len() > limit {
                info!("'{motif}' longer than {limit} bases; skipping");
                continue;
            }
        }
        match expand_ambiguity(motif.as_bytes()) {
            Ok(words) => {
                for word in words {
                    let word = String::from_utf8(word)
                        .map_err(|_| anyhow::anyhow!("non-UTF8 expansion of '{motif}'"))?;
                    writeln!(out, "{word}\t{}", word.len())?;
                    expanded_any = true;
                }
            }
            Err(e) => warn!("cannot expand '{motif}': {e}"),
        }
    }
    if !expanded_any {
        bail!("no sequence in {} could be expanded", input.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct CaiRow {
    id: String,
    cai: String,
}

impl CaiRow {
    const HEADER: [&'static str; 2] = ["id", "cai"];
}

fn run_cai(fasta_path: &Path, weights_path: &Path, output: Option<&Path>) -> Result<()> {
    let weights = io::load_codon_weights(weights_path)?;
    let records = fasta::read_fasta(fasta_path)?;
    if records.is_empty() {
        bail!("no records in {}", fasta_path.display());
    }
    let rows: Vec<CaiRow> = records
        .iter()
        .map(|(id, seq)| CaiRow {
            id: id.clone(),
            cai: io::na(compute_cai(&codon_usage(seq), &weights)),
        })
        .collect();
    io::write_rows(io::output_writer(output)?, b',', &CaiRow::HEADER, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write as _;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_clean_motif() {
        assert_eq!(clean_motif("GA(2/9)NTC ^1"), "GANTC");
        assert_eq!(clean_motif("  gaattc "), "gaattc");
        assert_eq!(clean_motif("12,?"), "");
    }

    #[test]
    fn test_fasta_files_in_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.fa", "a.fasta", "c.txt", "d.fna"] {
            std::fs::File::create(dir.path().join(name)).unwrap();
        }
        let files = fasta_files_in(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_stem_name(p)).collect();
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_fasta_files_in_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fasta_files_in(dir.path()).is_err());
    }

    #[test]
    fn test_batch_drops_failures_keeps_order() {
        let jobs = vec!["ok1", "bad", "ok2"];
        let out = batch(&jobs, |j| *j, |j| {
            if *j == "bad" {
                bail!("boom");
            }
            Ok(j.to_string())
        })
        .unwrap();
        assert_eq!(out, vec!["ok1".to_string(), "ok2".to_string()]);
    }

    #[test]
    fn test_batch_all_failed_is_error() {
        let jobs = vec!["a", "b"];
        let result: Result<Vec<()>> = batch(&jobs, |j| *j, |_| bail!("boom"));
        assert!(result.is_err());
    }

    #[test]
    fn test_run_count_kmers_end_to_end() {
        let mut fasta_file = tempfile::Builder::new().suffix(".fa").tempfile().unwrap();
        fasta_file.write_all(b">p\nATGC\n").unwrap();
        fasta_file.flush().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        run_count_kmers(fasta_file.path(), 2, false, Some(out.path())).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert!(text.starts_with("word,count\nAA,0\n"));
        assert!(text.contains("AT,1\n"));
        assert_eq!(text.lines().count(), 17);
    }

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_leading_lagging_pairs_skips_orphan() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "pA_leading_6.csv", "word,score\nAAA,1.0\n");
        write_file(dir.path(), "pA_lagging_6.csv", "word,score\nAAA,0.5\n");
        write_file(dir.path(), "pB_leading_6.csv", "word,score\nAAA,2.0\n");
        write_file(dir.path(), "notes.txt", "not a table\n");
        let pairs = leading_lagging_pairs(dir.path()).unwrap();
        // pB has no lagging counterpart and is dropped.
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].2, "pA_leading_6");
        assert_eq!(file_stem_name(&pairs[0].1), "pA_lagging_6");
    }

    #[test]
    fn test_leading_lagging_pairs_all_orphans_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "pA_leading_6.csv", "word,score\nAAA,1.0\n");
        assert!(leading_lagging_pairs(dir.path()).is_err());
    }

    #[test]
    fn test_run_compare_dir_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "pA_leading_6.csv",
            "word,score\nGAATTC,2.0\nAAAAAA,1.0\n",
        );
        write_file(
            dir.path(),
            "pA_lagging_6.csv",
            "word,score\nGAATTC,0.5\nAAAAAA,1.0\n",
        );
        write_file(dir.path(), "orphan_leading_6.csv", "word,score\nAAA,1.0\n");
        let mut targets = tempfile::NamedTempFile::new().unwrap();
        targets.write_all(b"GAATTC\n").unwrap();
        targets.flush().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        run_compare_dir(dir.path(), targets.path(), Some(out.path())).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "label,median_discrepancy_targets,median_discrepancy_others,statistic,p_value"
        );
        // One row: the matched pair; the orphan is skipped.
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("pA_leading_6,1.5,0,"));
    }

    #[test]
    fn test_run_expand_writes_lengths() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(b"AR\n\nGA(2/9)NTC\n").unwrap();
        input.flush().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        run_expand(input.path(), None, Some(out.path())).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // AR -> 2 expansions, GANTC -> 4.
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "AA\t2");
        assert!(lines.iter().all(|l| l.ends_with("\t2") || l.ends_with("\t5")));
    }

    #[test]
    fn test_run_expand_max_len_filters() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(b"ACGT\nACGTACGT\n").unwrap();
        input.flush().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        run_expand(input.path(), Some(4), Some(out.path())).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(text, "ACGT\t4\n");
    }
}
