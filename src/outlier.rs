//! Outlier analysis over posterior-risk tables: an extended pedigree
//! format with per-individual posterior probabilities, compared against a
//! collection of background tables to judge whether the real data's most
//! extreme individuals are unusually extreme.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::io::open_maybe_gz;
use crate::rank::{RankError, RankSummary, mean, rank, top_n, z_scores};

/// One row of a posterior-risk table: the six standard pedigree columns
/// followed by prior, posterior, phenotype risk, and genotype risk (with a
/// separator column between phenotype and prior).
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEntry {
    pub family_id: String,
    pub individual_id: String,
    pub father_id: String,
    pub mother_id: String,
    pub sex: String,
    pub phenotype: String,
    pub prior: f64,
    pub posterior: f64,
    pub pheno_risk: f64,
    pub geno_risk: String,
}

#[derive(Error, Debug)]
pub enum OutlierError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("risk table: {0}")]
    Csv(#[from] csv::Error),
    #[error("risk table row: expected 11 fields, found {0}")]
    FieldCount(usize),
    #[error("risk table row: invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("individual {0} not found in the real risk table")]
    IdNotFound(String),
    #[error("individual missing from {0} background table(s)")]
    MissingFromBackground(usize),
    #[error(transparent)]
    Rank(#[from] RankError),
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, OutlierError> {
    value.parse().map_err(|_| OutlierError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Reads a tab-delimited risk table. Rows must have exactly 11 columns; the
/// seventh is a separator and is ignored.
pub fn read_risk_entries<R: Read>(
    reader: R,
    has_header: bool,
) -> Result<Vec<RiskEntry>, OutlierError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_header)
        .flexible(true)
        .from_reader(reader);
    let mut entries = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        if row.len() != 11 {
            return Err(OutlierError::FieldCount(row.len()));
        }
        entries.push(RiskEntry {
            family_id: row[0].to_string(),
            individual_id: row[1].to_string(),
            father_id: row[2].to_string(),
            mother_id: row[3].to_string(),
            sex: row[4].to_string(),
            phenotype: row[5].to_string(),
            prior: parse_float("prior", &row[7])?,
            posterior: parse_float("posterior", &row[8])?,
            pheno_risk: parse_float("pheno_risk", &row[9])?,
            geno_risk: row[10].to_string(),
        });
    }
    Ok(entries)
}

/// Reads a risk table from a gzip-or-plain file.
pub fn read_risk_path(path: &Path, has_header: bool) -> Result<Vec<RiskEntry>, OutlierError> {
    read_risk_entries(open_maybe_gz(path)?, has_header)
}

/// All posterior values, in row order.
pub fn posteriors(entries: &[RiskEntry]) -> Vec<f64> {
    entries.iter().map(|entry| entry.posterior).collect()
}

/// The single entry with the highest posterior, if any.
pub fn biggest_outlier(entries: &[RiskEntry]) -> Option<&RiskEntry> {
    entries
        .iter()
        .max_by(|a, b| a.posterior.total_cmp(&b.posterior))
}

/// The `n` entries with the highest posteriors, descending.
pub fn biggest_outliers(entries: &[RiskEntry], n: usize) -> Vec<RiskEntry> {
    top_n(entries, n, |a, b| a.posterior.total_cmp(&b.posterior))
}

/// The fraction of background outliers whose posterior exceeds the real
/// outlier's.
pub fn outlier_percentage(real: &RiskEntry, background: &[RiskEntry]) -> f64 {
    rank(real.posterior, &posteriors(background)).percentile
}

/// Normalizes all posteriors in a table to z-scores.
pub fn posterior_z_scores(entries: &[RiskEntry]) -> Result<Vec<f64>, RankError> {
    z_scores(&posteriors(entries))
}

/// How one individual's posterior ranks within the real table and against
/// the backgrounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RankStats {
    /// Rank of the individual's real posterior among its own values across
    /// the background tables.
    pub chosen_rank: RankSummary,
    /// Rank of the individual's posterior among all posteriors in the real
    /// table.
    pub chosen_internal_rank: RankSummary,
    /// For each background table, the rank of the individual's posterior in
    /// that table among the table's posteriors.
    pub background_ranks: Vec<RankSummary>,
}

/// Computes [`RankStats`] for `individual_id`. Every background table must
/// contain the individual.
pub fn rank_stats(
    individual_id: &str,
    real_entries: &[RiskEntry],
    background_sets: &[Vec<RiskEntry>],
) -> Result<RankStats, OutlierError> {
    let real_value = real_entries
        .iter()
        .find(|entry| entry.individual_id == individual_id)
        .map(|entry| entry.posterior)
        .ok_or_else(|| OutlierError::IdNotFound(individual_id.to_string()))?;

    let chosen_internal_rank = rank(real_value, &posteriors(real_entries));

    let mut background_values = Vec::with_capacity(background_sets.len());
    let mut missing = 0usize;
    for set in background_sets {
        match set.iter().find(|entry| entry.individual_id == individual_id) {
            Some(entry) => background_values.push(entry.posterior),
            None => missing += 1,
        }
    }
    if missing > 0 {
        return Err(OutlierError::MissingFromBackground(missing));
    }
    let chosen_rank = rank(real_value, &background_values);

    let background_ranks = background_sets
        .iter()
        .zip(&background_values)
        .map(|(set, &value)| rank(value, &posteriors(set)))
        .collect();

    Ok(RankStats {
        chosen_rank,
        chosen_internal_rank,
        background_ranks,
    })
}

/// Configuration for the outlier comparison workflow.
#[derive(Debug, Clone)]
pub struct OutlierConfig {
    pub real_path: PathBuf,
    pub real_header: bool,
    pub background_paths: Vec<PathBuf>,
    pub background_header: bool,
    /// When set, average the top `n` posteriors (and z-scores) instead of
    /// taking the single most extreme value.
    pub top_n: Option<usize>,
    /// Individual to run rank statistics on.
    pub chosen: Option<String>,
}

/// The outlier comparison report.
#[derive(Debug, Clone)]
pub struct OutlierReport {
    /// Fraction of backgrounds whose extreme posterior (or top-n mean)
    /// exceeds the real one.
    pub outlier_percentage: f64,
    /// Mean of the backgrounds' extreme posteriors (or top-n means).
    pub background_mean: f64,
    /// The real table's highest posterior z-score (or top-n mean of
    /// z-scores).
    pub real_best_z: f64,
    /// Rank of `real_best_z` among each background's equivalent.
    pub z_rank: RankSummary,
    pub rank_stats: Option<RankStats>,
}

fn best_statistic(entries: &[RiskEntry], top: Option<usize>) -> Result<f64, OutlierError> {
    match top {
        None => biggest_outlier(entries)
            .map(|entry| entry.posterior)
            .ok_or(OutlierError::Rank(RankError::EmptyInput)),
        Some(n) => Ok(mean(&posteriors(&biggest_outliers(entries, n)))?),
    }
}

fn best_z(entries: &[RiskEntry], top: Option<usize>) -> Result<f64, OutlierError> {
    let zs = posterior_z_scores(entries)?;
    match top {
        None => Ok(zs.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        Some(n) => Ok(mean(&top_n(&zs, n, |a, b| a.total_cmp(b)))?),
    }
}

/// Runs the full comparison: real extreme vs. background extremes, z-score
/// placement, and optional per-individual rank statistics.
pub fn run_outlier(config: &OutlierConfig) -> Result<OutlierReport, OutlierError> {
    let real_entries = read_risk_path(&config.real_path, config.real_header)?;
    let background_sets: Vec<Vec<RiskEntry>> = config
        .background_paths
        .iter()
        .map(|path| read_risk_path(path, config.background_header))
        .collect::<Result<_, _>>()?;

    let real_best = best_statistic(&real_entries, config.top_n)?;
    let background_bests: Vec<f64> = background_sets
        .iter()
        .map(|set| best_statistic(set, config.top_n))
        .collect::<Result<_, _>>()?;

    let real_best_z = best_z(&real_entries, config.top_n)?;
    let background_best_zs: Vec<f64> = background_sets
        .iter()
        .map(|set| best_z(set, config.top_n))
        .collect::<Result<_, _>>()?;

    let rank_stats = match &config.chosen {
        Some(id) => Some(rank_stats(id, &real_entries, &background_sets)?),
        None => None,
    };

    Ok(OutlierReport {
        outlier_percentage: rank(real_best, &background_bests).percentile,
        background_mean: mean(&background_bests)?,
        real_best_z,
        z_rank: rank(real_best_z, &background_best_zs),
        rank_stats,
    })
}
