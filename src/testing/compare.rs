//! Per-entity comparison of two measurement groups.
//!
//! This module produces the effect size (log2 fold change) and significance
//! (two-sided Welch t-test p-value) for every entity shared by a numerator
//! and a denominator group. Inputs are assumed to be in log2 space, so the
//! fold change is a plain difference of row means.
//!
//! Degenerate rows never panic and never abort the batch: fewer than two
//! replicates on either side, or zero variance in both groups, yields a NaN
//! p-value that downstream correction treats as "test undefined".

use crate::error::Result;
use crate::testing::{ComparisonResult, MeasurementGroup, check_same_entities};
use ndarray::ArrayView1;
use num_traits::{Float, ToPrimitive};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Compute the per-entity log2 fold change between two groups.
///
/// Per entity this is `mean(numerator_row) - mean(denominator_row)`. A group
/// with zero replicate columns produces NaN for every entity.
///
/// # Errors
///
/// Fails when the groups do not share one ordered entity index.
pub fn log2_fold_changes(
    numerator: &MeasurementGroup,
    denominator: &MeasurementGroup,
) -> Result<Vec<f64>> {
    check_same_entities(numerator, denominator)?;

    let lfc = numerator
        .values()
        .rows()
        .into_iter()
        .zip(denominator.values().rows())
        .map(|(num_row, den_row)| row_mean(num_row) - row_mean(den_row))
        .collect();

    Ok(lfc)
}

/// Compute the per-entity two-sided Welch p-value between two groups.
///
/// # Errors
///
/// Fails when the groups do not share one ordered entity index.
pub fn welch_p_values(
    numerator: &MeasurementGroup,
    denominator: &MeasurementGroup,
) -> Result<Vec<f64>> {
    check_same_entities(numerator, denominator)?;

    let p_values = numerator
        .values()
        .rows()
        .into_iter()
        .zip(denominator.values().rows())
        .map(|(num_row, den_row)| welch_t_test(&num_row.to_vec(), &den_row.to_vec()))
        .collect();

    Ok(p_values)
}

/// Compare two measurement groups entity by entity.
///
/// Returns one `ComparisonResult` per entity, in the input entity order.
/// Rows are independent, so they are processed in parallel; the output order
/// is unaffected.
///
/// # Errors
///
/// Fails when the groups do not share one ordered entity index.
pub fn compare(
    numerator: &MeasurementGroup,
    denominator: &MeasurementGroup,
) -> Result<Vec<ComparisonResult>> {
    check_same_entities(numerator, denominator)?;

    let num = numerator.values();
    let den = denominator.values();

    let results = (0..numerator.n_entities())
        .into_par_iter()
        .map(|row| {
            let x = num.row(row);
            let y = den.row(row);
            ComparisonResult {
                lfc: row_mean(x) - row_mean(y),
                p_value: welch_t_test(&x.to_vec(), &y.to_vec()),
            }
        })
        .collect();

    Ok(results)
}

/// Two-sided unequal-variance (Welch) t-test between two samples.
///
/// Returns the p-value, or NaN when the test is undefined: fewer than two
/// observations on either side, a zero standard error (both samples constant,
/// t = 0/0), or non-finite input values.
pub fn welch_t_test<T>(x: &[T], y: &[T]) -> f64
where
    T: Float + ToPrimitive,
{
    let nx = x.len();
    let ny = y.len();

    if nx < 2 || ny < 2 {
        return f64::NAN;
    }

    let (mean_x, var_x) = mean_and_variance(x);
    let (mean_y, var_y) = mean_and_variance(y);

    let term_x = var_x / nx as f64;
    let term_y = var_y / ny as f64;
    let se_sq = term_x + term_y;

    // Both samples constant: the t-statistic is 0/0, not a valid test.
    if se_sq <= 0.0 || !se_sq.is_finite() {
        return f64::NAN;
    }

    let t_stat = (mean_x - mean_y) / se_sq.sqrt();

    // Welch-Satterthwaite degrees of freedom
    let df = se_sq * se_sq
        / (term_x * term_x / (nx as f64 - 1.0) + term_y * term_y / (ny as f64 - 1.0));

    two_sided_p_value(t_stat, df)
}

fn row_mean(row: ArrayView1<f64>) -> f64 {
    match row.mean() {
        Some(mean) => mean,
        None => f64::NAN,
    }
}

fn mean_and_variance<T>(sample: &[T]) -> (f64, f64)
where
    T: Float + ToPrimitive,
{
    let n = sample.len() as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for value in sample {
        let value = value.to_f64().unwrap_or(f64::NAN);
        sum += value;
        sum_sq += value * value;
    }

    let mean = sum / n;
    // Computational formula; rounding can push a constant sample slightly
    // below zero, which must still read as zero variance.
    let var = ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0);
    (mean, var)
}

fn two_sided_p_value(t_stat: f64, df: f64) -> f64 {
    if !t_stat.is_finite() {
        // Perfect separation with nonzero spread on one side only
        return if t_stat.is_infinite() { 0.0 } else { f64::NAN };
    }
    if !df.is_finite() || df <= 0.0 {
        return f64::NAN;
    }

    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t_stat.abs()))).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn group(ids: &[&str], values: ndarray::Array2<f64>) -> MeasurementGroup {
        MeasurementGroup::new(ids.iter().map(|s| s.to_string()).collect(), values).unwrap()
    }

    #[test]
    fn welch_detects_clear_difference() {
        let p = welch_t_test(&[1.0, 2.0, 3.0], &[7.0, 8.0, 9.0]);
        assert!(p < 0.05, "expected significant difference, got p={p}");
    }

    #[test]
    fn welch_is_symmetric() {
        let p_ab = welch_t_test(&[1.0, 2.0, 3.0], &[4.0, 5.0, 7.0]);
        let p_ba = welch_t_test(&[4.0, 5.0, 7.0], &[1.0, 2.0, 3.0]);
        assert_relative_eq!(p_ab, p_ba, epsilon = 1e-12);
    }

    #[test]
    fn welch_near_one_for_identical_spread_groups() {
        let p = welch_t_test(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!(p > 0.9, "identical samples should not look significant, got p={p}");
    }

    #[test]
    fn welch_undefined_with_single_replicate() {
        assert!(welch_t_test(&[1.0], &[2.0, 3.0, 4.0]).is_nan());
        assert!(welch_t_test(&[1.0, 2.0], &[3.0]).is_nan());
        assert!(welch_t_test::<f64>(&[], &[]).is_nan());
    }

    #[test]
    fn welch_undefined_when_both_groups_constant() {
        // t = 0/0 regardless of whether the means differ
        assert!(welch_t_test(&[2.0, 2.0, 2.0], &[1.0, 1.0, 1.0]).is_nan());
        assert!(welch_t_test(&[5.0, 5.0], &[5.0, 5.0]).is_nan());
    }

    #[test]
    fn welch_zero_p_on_perfect_separation_with_spread() {
        // One constant group against a spread group stays defined
        let p = welch_t_test(&[1.0, 1.0, 1.0], &[8.0, 9.0, 10.0]);
        assert!(p < 0.01, "got p={p}");
    }

    #[test]
    fn welch_accepts_f32_samples() {
        let p = welch_t_test(&[1.0f32, 2.0, 3.0], &[7.0f32, 8.0, 9.0]);
        assert!(p < 0.05);
    }

    #[test]
    fn lfc_is_mean_difference_in_log2_space() {
        let numerator = group(&["a"], array![[2.0, 2.0, 2.0]]);
        let denominator = group(&["a"], array![[1.0, 1.0, 1.0]]);

        let lfc = log2_fold_changes(&numerator, &denominator).unwrap();
        assert_eq!(lfc, vec![1.0]);

        // Same pair through the combined entry point: lfc exact, test undefined
        let results = compare(&numerator, &denominator).unwrap();
        assert_eq!(results[0].lfc, 1.0);
        assert!(results[0].p_value.is_nan());
    }

    #[test]
    fn lfc_nan_without_replicate_columns() {
        let numerator = group(&["a", "b"], ndarray::Array2::zeros((2, 0)));
        let denominator = group(&["a", "b"], array![[1.0, 1.0], [2.0, 2.0]]);

        let lfc = log2_fold_changes(&numerator, &denominator).unwrap();
        assert!(lfc.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn compare_preserves_entity_order() {
        let numerator = group(
            &["up", "flat", "down"],
            array![[5.0, 5.5, 4.5], [3.0, 3.1, 2.9], [1.0, 1.5, 0.5]],
        );
        let denominator = group(
            &["up", "flat", "down"],
            array![[1.0, 1.5, 0.5], [3.0, 3.1, 2.9], [5.0, 5.5, 4.5]],
        );

        let results = compare(&numerator, &denominator).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].lfc > 0.0);
        assert_relative_eq!(results[1].lfc, 0.0, epsilon = 1e-12);
        assert!(results[2].lfc < 0.0);
        assert!(results[0].p_value < 0.05);
        assert!(results[1].p_value > 0.5);
    }

    #[test]
    fn compare_rejects_mismatched_entities() {
        let numerator = group(&["a", "b"], array![[1.0, 2.0], [3.0, 4.0]]);
        let denominator = group(&["a", "c"], array![[1.0, 2.0], [3.0, 4.0]]);

        assert!(matches!(
            compare(&numerator, &denominator),
            Err(StatsError::EntityMismatch { .. })
        ));
        assert!(matches!(
            log2_fold_changes(&numerator, &denominator),
            Err(StatsError::EntityMismatch { .. })
        ));
        assert!(matches!(
            welch_p_values(&numerator, &denominator),
            Err(StatsError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn compare_agrees_with_slice_level_test() {
        let numerator = group(&["a"], array![[4.0, 5.0, 6.0]]);
        let denominator = group(&["a"], array![[1.0, 2.0, 3.0]]);

        let results = compare(&numerator, &denominator).unwrap();
        let direct = welch_t_test(&[4.0, 5.0, 6.0], &[1.0, 2.0, 3.0]);
        assert_relative_eq!(results[0].p_value, direct, epsilon = 1e-12);
        assert_relative_eq!(results[0].lfc, 3.0, epsilon = 1e-12);
    }
}
