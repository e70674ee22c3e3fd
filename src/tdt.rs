//! The TDT statistic engine: chi-squared computation and summary
//! statistics over a set of family trios.
//!
//! All arithmetic is plain floating point. A degenerate input (zero
//! families, or zero total offspring) produces NaN statistics rather than
//! an error; that is deliberate, and downstream consumers filter such
//! results before rank computations (see [`crate::monte::remove_degenerate`]).

use log::error;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::families::condense;
use crate::types::{Family, TdtResult};

/// The one-degree-of-freedom TDT chi-squared for a pooled trio, where `b`
/// is the male offspring count and `c` the female count:
/// `(b - c)^2 / (b + c)`. Both counts zero yields NaN.
pub fn chi_squared_trio(b: f64, c: f64) -> f64 {
    (b - c) * (b - c) / (b + c)
}

/// Condenses `families` into one pooled trio and returns its chi-squared.
pub fn chi_squared_multi_family(families: &[Family]) -> f64 {
    let sums = condense(families);
    chi_squared_trio(sums.male_offspring, sums.female_offspring)
}

/// Right-tailed significance of a chi-squared statistic under one degree
/// of freedom.
fn chi_squared_p_value(chi_squared: f64) -> f64 {
    match ChiSquared::new(1.0) {
        Ok(dist) => 1.0 - dist.cdf(chi_squared.abs()),
        Err(e) => {
            // Unreachable for df = 1.0; keep the result visibly degenerate
            // rather than inventing a significance level.
            error!("failed to construct chi-squared distribution (df=1): {e}");
            f64::NAN
        }
    }
}

/// Runs the TDT on a set of family trios, pooling them into one condensed
/// trio. `name` is left empty and `orphan` false; the caller annotates both.
pub fn run_tdt(families: &[Family]) -> TdtResult {
    let totals = condense(families);
    let chi_squared = chi_squared_trio(totals.male_offspring, totals.female_offspring);
    let p_value = chi_squared_p_value(chi_squared);

    let family_count = families.len() as f64;
    TdtResult {
        name: String::new(),
        totals,
        family_count,
        male_proportion: totals.male_offspring / totals.total(),
        mean_males_per_family: totals.male_offspring / family_count,
        mean_females_per_family: totals.female_offspring / family_count,
        mean_children_per_family: totals.total() / family_count,
        chi_squared,
        p_value,
        orphan: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_chi_squared_trio_balanced_is_zero() {
        assert_eq!(chi_squared_trio(1.0, 1.0), 0.0);
        assert_eq!(chi_squared_trio(7.0, 7.0), 0.0);
    }

    #[test]
    fn test_chi_squared_trio_is_symmetric() {
        for (b, c) in [(3.0, 9.0), (10.0, 2.0), (0.0, 5.0)] {
            assert_eq!(chi_squared_trio(b, c), chi_squared_trio(c, b));
        }
    }

    #[test]
    fn test_chi_squared_trio_zero_offspring_is_nan() {
        assert!(chi_squared_trio(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_run_tdt_summary_statistics() {
        let families = vec![
            Family::new(3.0, 1.0),
            Family::new(2.0, 2.0),
            Family::new(4.0, 0.0),
        ];
        let r = run_tdt(&families);
        assert_eq!(r.totals, Family::new(9.0, 3.0));
        assert_eq!(r.family_count, 3.0);
        assert_relative_eq!(r.male_proportion, 0.75);
        assert_relative_eq!(r.mean_males_per_family, 3.0);
        assert_relative_eq!(r.mean_females_per_family, 1.0);
        assert_relative_eq!(r.mean_children_per_family, 4.0);
        // (9 - 3)^2 / 12 = 3
        assert_relative_eq!(r.chi_squared, 3.0);
        assert_eq!(chi_squared_multi_family(&families), r.chi_squared);
        // P(X > 3) for chi-squared(1).
        assert_relative_eq!(r.p_value, 0.0832645, epsilon = 1e-6);
    }

    #[test]
    fn test_run_tdt_balanced_p_value_is_one() {
        let r = run_tdt(&[Family::new(5.0, 5.0)]);
        assert_eq!(r.chi_squared, 0.0);
        assert_relative_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_run_tdt_critical_value() {
        // chi-squared of 3.841459 is the 95th percentile at df = 1.
        let r = run_tdt(&[Family::new(0.0, 3.841459)]);
        assert_relative_eq!(r.chi_squared, 3.841459, epsilon = 1e-6);
        assert_relative_eq!(r.p_value, 0.05, epsilon = 1e-4);
    }

    #[test]
    fn test_run_tdt_empty_input_is_degenerate_not_fatal() {
        let r = run_tdt(&[]);
        assert!(r.chi_squared.is_nan());
        assert!(r.p_value.is_nan());
        assert!(r.mean_children_per_family.is_nan());
    }
}
