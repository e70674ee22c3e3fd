//! The Monte Carlo engine: null-distribution construction by binomial
//! resampling of background family sizes, and rank-based significance of
//! the actual result against that background.
//!
//! The pseudorandom source is owned by the caller and passed explicitly;
//! given the same source state and inputs, output is reproducible. The
//! engine itself is single-threaded.

use itertools::Itertools;
use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::tdt::run_tdt;
use crate::types::{Family, TdtResult};

/// The percentiles at which [`top_significant_percentage`] is evaluated by
/// the standard report.
pub const REPORT_PERCENTILES: [f64; 4] = [0.05, 0.01, 0.001, 0.0001];

/// For each total offspring count, draws `males ~ Binomial(n = total,
/// p = 0.5)` and sets `females = total - males`: one synthetic family per
/// input total, independent draws, fair 1:1 null.
pub fn sample_permuted_families<R: Rng + ?Sized>(rng: &mut R, totals: &[f64]) -> Vec<Family> {
    totals
        .iter()
        .map(|&total| {
            let n = total.round() as u64;
            // p = 0.5 is always a valid probability.
            let males = Binomial::new(n, 0.5)
                .expect("binomial with p = 0.5 is well-formed")
                .sample(rng) as f64;
            Family::new(males, total - males)
        })
        .collect()
}

/// Runs [`sample_permuted_families`] `n_replicates` times, producing
/// independent synthetic family sets.
pub fn replicate<R: Rng + ?Sized>(
    rng: &mut R,
    n_replicates: usize,
    totals: &[f64],
) -> Vec<Vec<Family>> {
    (0..n_replicates)
        .map(|_| sample_permuted_families(rng, totals))
        .collect()
}

/// Runs the TDT independently on each single family (not condensed),
/// building a per-family background distribution.
pub fn test_each_family(families: &[Family]) -> Vec<TdtResult> {
    families
        .iter()
        .map(|family| run_tdt(std::slice::from_ref(family)))
        .collect()
}

/// Maps [`test_each_family`] over every replicate set.
pub fn test_replicate_sets(family_sets: &[Vec<Family>]) -> Vec<Vec<TdtResult>> {
    family_sets
        .iter()
        .map(|families| test_each_family(families))
        .collect()
}

/// True iff the actual result is at least as significant as every
/// background result in the set.
pub fn most_significant(actual: &TdtResult, background: &[TdtResult]) -> bool {
    background.iter().all(|result| actual.p_value <= result.p_value)
}

/// The fraction of replicate sets in which no background individual is more
/// significant than the actual result.
pub fn most_significant_percentage(actual: &TdtResult, background_sets: &[Vec<TdtResult>]) -> f64 {
    let hits = background_sets
        .iter()
        .filter(|set| most_significant(actual, set))
        .count();
    hits as f64 / background_sets.len() as f64
}

/// True iff the actual p-value falls below the `percentile` threshold of
/// the background set's sorted p-values. An empty background never
/// qualifies.
pub fn top_significant(percentile: f64, actual: &TdtResult, background: &[TdtResult]) -> bool {
    if background.is_empty() {
        return false;
    }
    let sorted: Vec<f64> = background
        .iter()
        .map(|result| result.p_value)
        .sorted_by(f64::total_cmp)
        .collect();
    let threshold = sorted[(sorted.len() as f64 * percentile) as usize];
    actual.p_value < threshold
}

/// The fraction of replicate sets for which [`top_significant`] holds at
/// `percentile`.
pub fn top_significant_percentage(
    percentile: f64,
    actual: &TdtResult,
    background_sets: &[Vec<TdtResult>],
) -> f64 {
    let hits = background_sets
        .iter()
        .filter(|set| top_significant(percentile, actual, set))
        .count();
    hits as f64 / background_sets.len() as f64
}

/// Pooled empirical significance: the fraction of all individual background
/// results, across every replicate and family, whose p-value exceeds the
/// actual's.
pub fn pooled_empirical_p(actual: &TdtResult, background_sets: &[Vec<TdtResult>]) -> f64 {
    let mut better = 0usize;
    let mut count = 0usize;
    for set in background_sets {
        for result in set {
            if actual.p_value < result.p_value {
                better += 1;
            }
            count += 1;
        }
    }
    better as f64 / count as f64
}

/// Drops background results that carry no statistical information: fewer
/// than one total offspring, or a non-finite p-value. Including them would
/// corrupt percentile calculations downstream.
pub fn remove_degenerate(results: Vec<TdtResult>) -> Vec<TdtResult> {
    results
        .into_iter()
        .filter(|result| result.totals.total() >= 1.0 && result.p_value.is_finite())
        .collect()
}

/// Per-family total offspring counts, the scaffold for simulation.
pub fn background_totals(results: &[TdtResult]) -> Vec<f64> {
    results.iter().map(|result| result.totals.total()).collect()
}

/// The standard Monte Carlo significance report for one actual result.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloReport {
    pub replicates: usize,
    /// Fraction of replicate sets in which the actual result beats every
    /// background individual.
    pub most_significant: f64,
    /// [`top_significant_percentage`] at each of [`REPORT_PERCENTILES`].
    pub top_significant: [f64; 4],
    pub pooled_empirical_p: f64,
}

/// Filters the background, simulates `n_replicates` null family sets from
/// its total offspring counts, and ranks `actual` against them.
pub fn run_monte_carlo<R: Rng + ?Sized>(
    rng: &mut R,
    n_replicates: usize,
    actual: &TdtResult,
    background: Vec<TdtResult>,
) -> MonteCarloReport {
    let background = remove_degenerate(background);
    let totals = background_totals(&background);
    let replicate_sets = test_replicate_sets(&replicate(rng, n_replicates, &totals));

    let top_significant = REPORT_PERCENTILES
        .map(|percentile| top_significant_percentage(percentile, actual, &replicate_sets));

    MonteCarloReport {
        replicates: n_replicates,
        most_significant: most_significant_percentage(actual, &replicate_sets),
        top_significant,
        pooled_empirical_p: pooled_empirical_p(actual, &replicate_sets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn result_with_p(p_value: f64) -> TdtResult {
        TdtResult {
            name: String::new(),
            totals: Family::new(5.0, 5.0),
            family_count: 1.0,
            male_proportion: 0.5,
            mean_males_per_family: 5.0,
            mean_females_per_family: 5.0,
            mean_children_per_family: 10.0,
            chi_squared: 0.0,
            p_value,
            orphan: false,
        }
    }

    #[test]
    fn test_sample_preserves_totals() {
        let mut rng = StdRng::seed_from_u64(7);
        let totals = vec![10.0, 3.0, 0.0, 25.0];
        let families = sample_permuted_families(&mut rng, &totals);
        assert_eq!(families.len(), totals.len());
        for (family, &total) in families.iter().zip(&totals) {
            assert_eq!(family.total(), total);
            assert!(family.male_offspring >= 0.0 && family.male_offspring <= total);
        }
    }

    #[test]
    fn test_sampling_is_deterministic_under_a_seed() {
        let totals = vec![10.0; 100];
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(
            sample_permuted_families(&mut a, &totals),
            sample_permuted_families(&mut b, &totals)
        );
        // Replicates consume the stream: two draws from one source differ.
        let mut c = StdRng::seed_from_u64(42);
        let sets = replicate(&mut c, 2, &totals);
        assert_ne!(sets[0], sets[1]);
    }

    #[test]
    fn test_most_significant_requires_beating_every_background() {
        let actual = result_with_p(0.01);
        let weaker = vec![result_with_p(0.5), result_with_p(0.01), result_with_p(0.9)];
        assert!(most_significant(&actual, &weaker));
        let stronger = vec![result_with_p(0.5), result_with_p(0.001)];
        assert!(!most_significant(&actual, &stronger));

        let sets = vec![weaker, stronger];
        assert_eq!(most_significant_percentage(&actual, &sets), 0.5);
    }

    #[test]
    fn test_top_significant_threshold_indexing() {
        let background: Vec<TdtResult> =
            (1..=100).map(|i| result_with_p(i as f64 / 100.0)).collect();
        // 5th-percentile threshold is the 6th smallest p (index 5) = 0.06.
        assert!(top_significant(0.05, &result_with_p(0.059), &background));
        assert!(!top_significant(0.05, &result_with_p(0.06), &background));
        assert!(!top_significant(0.05, &result_with_p(0.2), &background));
    }

    #[test]
    fn test_top_significant_percentage_saturates_at_one() {
        // Every background p-value is far above the actual's, so the actual
        // is below the 5th percentile of every set.
        let set: Vec<TdtResult> = (0..50).map(|_| result_with_p(0.8)).collect();
        let sets = vec![set.clone(), set.clone(), set];
        let actual = result_with_p(1e-6);
        assert_eq!(top_significant_percentage(0.05, &actual, &sets), 1.0);
    }

    #[test]
    fn test_pooled_empirical_p() {
        let sets = vec![
            vec![result_with_p(0.1), result_with_p(0.9)],
            vec![result_with_p(0.2), result_with_p(0.02)],
        ];
        let actual = result_with_p(0.05);
        // 0.1, 0.9, and 0.2 exceed the actual; 0.02 does not.
        assert_eq!(pooled_empirical_p(&actual, &sets), 0.75);
    }

    #[test]
    fn test_remove_degenerate_filters_empty_and_non_finite() {
        let mut empty = result_with_p(0.5);
        empty.totals = Family::default();
        let nan = result_with_p(f64::NAN);
        let inf = result_with_p(f64::INFINITY);
        let good = result_with_p(0.5);
        let kept = remove_degenerate(vec![empty, nan, inf, good.clone()]);
        assert_eq!(kept, vec![good]);
    }

    #[test]
    fn test_run_monte_carlo_seeded_report_is_reproducible() {
        let background: Vec<TdtResult> = (0..20).map(|_| result_with_p(0.4)).collect();
        let actual = result_with_p(0.001);
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let report_a = run_monte_carlo(&mut a, 10, &actual, background.clone());
        let report_b = run_monte_carlo(&mut b, 10, &actual, background);
        assert_eq!(report_a, report_b);
        assert_eq!(report_a.replicates, 10);
    }
}
