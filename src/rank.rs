//! Ranking and z-score utilities shared by the Monte Carlo and outlier
//! analysis paths.

use std::cmp::Ordering;

use itertools::Itertools;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("statistic requires at least one value")]
    EmptyInput,
    #[error("z-scores are undefined for a zero-variance sample")]
    ZeroVariance,
}

/// Arithmetic mean. Errors on an empty slice rather than returning NaN.
pub fn mean(values: &[f64]) -> Result<f64, RankError> {
    if values.is_empty() {
        return Err(RankError::EmptyInput);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> Result<f64, RankError> {
    let m = mean(values)?;
    let variance = values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

/// `(x - mean) / stddev` for each value. A zero-variance sample is an
/// explicit error rather than a silent division by zero.
pub fn z_scores(values: &[f64]) -> Result<Vec<f64>, RankError> {
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if sd == 0.0 {
        return Err(RankError::ZeroVariance);
    }
    Ok(values.iter().map(|x| (x - m) / sd).collect())
}

/// Where `x` sits within a population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankSummary {
    /// `count_greater / total`; 0.0 means nothing in the population exceeds
    /// `x`. NaN for an empty population.
    pub percentile: f64,
    /// Population members strictly greater than `x`.
    pub count_greater: usize,
    pub total: usize,
}

/// Ranks `x` against `values` by strictly-greater count.
pub fn rank(x: f64, values: &[f64]) -> RankSummary {
    let count_greater = values.iter().filter(|&&v| v > x).count();
    RankSummary {
        percentile: count_greater as f64 / values.len() as f64,
        count_greater,
        total: values.len(),
    }
}

/// The `n` largest elements under `compare`, descending. Returns all
/// elements when fewer than `n` exist. The underlying sort is stable, so
/// ties retain input order.
pub fn top_n<T: Clone, F>(values: &[T], n: usize, mut compare: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| compare(a, b).reverse());
    sorted.truncate(n);
    sorted
}

/// The value at the `p` quantile of `values` (sorted ascending, index
/// `floor(p * len)`). NaN for an empty slice.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();
    let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// A Kolmogorov-Smirnov goodness-of-fit result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// The supremum distance D between the empirical and reference CDFs.
    pub statistic: f64,
    /// Asymptotic significance of D.
    pub p_value: f64,
    pub n: usize,
}

/// One-sample Kolmogorov-Smirnov test of `values` against the chi-squared
/// distribution with one degree of freedom. Used to check whether a stream
/// of observed TDT statistics is consistent with the null.
pub fn kolmogorov_smirnov_chi2(values: &[f64]) -> Result<KsResult, RankError> {
    if values.is_empty() {
        return Err(RankError::EmptyInput);
    }
    // df = 1.0 cannot fail validation.
    let dist = ChiSquared::new(1.0).expect("chi-squared with df = 1 is well-formed");

    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();
    let n = sorted.len();
    let mut statistic: f64 = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        let cdf = dist.cdf(x);
        let above = (i as f64 + 1.0) / n as f64 - cdf;
        let below = cdf - i as f64 / n as f64;
        statistic = statistic.max(above.max(below));
    }

    Ok(KsResult {
        statistic,
        p_value: kolmogorov_p_value(n, statistic),
        n,
    })
}

/// Asymptotic Kolmogorov significance Q(lambda) with the small-sample
/// correction `lambda = (sqrt(n) + 0.12 + 0.11 / sqrt(n)) * D`.
fn kolmogorov_p_value(n: usize, statistic: f64) -> f64 {
    let sqrt_n = (n as f64).sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * statistic;
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..=100 {
        let term = sign * (-2.0 * (k as f64) * (k as f64) * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-10 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_z_scores_normalize() {
        let zs = z_scores(&[2.0, 4.0, 6.0]).unwrap();
        // mean 4, population sd sqrt(8/3).
        let sd = (8.0_f64 / 3.0).sqrt();
        assert_relative_eq!(zs[0], -2.0 / sd);
        assert_relative_eq!(zs[1], 0.0);
        assert_relative_eq!(zs[2], 2.0 / sd);
    }

    #[test]
    fn test_z_scores_flag_degenerate_inputs() {
        assert_eq!(z_scores(&[]), Err(RankError::EmptyInput));
        assert_eq!(z_scores(&[3.0, 3.0, 3.0]), Err(RankError::ZeroVariance));
    }

    #[test]
    fn test_rank_of_the_maximum_counts_nothing_greater() {
        let pop = vec![1.0, 5.0, 3.0];
        let summary = rank(5.0, &pop);
        assert_eq!(summary.count_greater, 0);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.percentile, 0.0);
    }

    #[test]
    fn test_rank_counts_strictly_greater() {
        let pop = vec![1.0, 2.0, 2.0, 3.0, 4.0];
        let summary = rank(2.0, &pop);
        assert_eq!(summary.count_greater, 2);
        assert_relative_eq!(summary.percentile, 0.4);
    }

    #[test]
    fn test_top_n_descending_and_short_input() {
        let values = vec![3.0, 1.0, 4.0, 1.5, 9.0];
        let top = top_n(&values, 3, |a: &f64, b: &f64| a.total_cmp(b));
        assert_eq!(top, vec![9.0, 4.0, 3.0]);
        assert_eq!(top_n(&values, 10, |a, b| a.total_cmp(b)).len(), 5);
    }

    #[test]
    fn test_quantile_floor_indexing() {
        let values = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile(&values, 0.0), 10.0);
        assert_eq!(quantile(&values, 0.5), 30.0);
        assert_eq!(quantile(&values, 0.95), 40.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_ks_detects_obvious_mismatch() {
        // A point mass far in the tail of chi-squared(1).
        let values = vec![50.0; 200];
        let result = kolmogorov_smirnov_chi2(&values).unwrap();
        assert!(result.statistic > 0.9);
        assert!(result.p_value < 1e-6);
    }

    #[test]
    fn test_ks_accepts_a_well_matched_sample() {
        // Midpoint quantiles of the reference distribution itself.
        let dist = ChiSquared::new(1.0).unwrap();
        let n = 200;
        let values: Vec<f64> = (0..n)
            .map(|i| dist.inverse_cdf((i as f64 + 0.5) / n as f64))
            .collect();
        let result = kolmogorov_smirnov_chi2(&values).unwrap();
        assert!(result.statistic < 0.01);
        assert!(result.p_value > 0.99);
    }

    #[test]
    fn test_ks_empty_input_is_an_error() {
        assert_eq!(
            kolmogorov_smirnov_chi2(&[]).unwrap_err(),
            RankError::EmptyInput
        );
    }
}
