//! Multiple testing correction for per-entity p-values.
//!
//! The primary method is the Benjamini-Hochberg step-up procedure, which
//! controls the false discovery rate: the expected proportion of false
//! positives among all rejected null hypotheses. A Bonferroni variant is
//! provided for callers that need family-wise error control instead.
//!
//! NaN p-values mark entities whose test was undefined. They are excluded
//! from the hypothesis count and from ranking, and come back out as
//! `p_adjusted = NaN`, `significant = false` at their original positions.

use crate::error::{Result, StatsError};
use crate::testing::AdjustedPValue;
use std::cmp::Ordering;

/// Apply the Benjamini-Hochberg procedure and decide significance at `alpha`.
///
/// Implemented as an explicit descending scan: the finite p-values are
/// stable-sorted from largest to smallest, assigned ranks `m` down to `1`,
/// and each candidate `p * m / rank` is clamped by a running minimum so the
/// adjusted values are monotone in the raw p-values. Once one entity clears
/// `alpha`, every remaining (smaller-p) entity is rejected as well, matching
/// the textbook step-up decision rule.
///
/// Ties keep their encounter order rather than the tie-averaged ranking of
/// reference implementations; downstream consumers depend on this exact
/// legacy output.
///
/// Returns one `AdjustedPValue` per input, in input order. An empty input
/// yields an empty vector.
///
/// # Errors
///
/// Fails when `alpha` is outside (0, 1) or any non-NaN p-value is outside
/// [0, 1].
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> Result<Vec<AdjustedPValue>> {
    check_alpha(alpha)?;
    check_p_values(p_values)?;

    let n = p_values.len();
    let mut adjusted = vec![
        AdjustedPValue {
            p_adjusted: f64::NAN,
            significant: false,
        };
        n
    ];

    // Ranked entities carry their original position for reinsertion.
    let mut ranked: Vec<(usize, f64)> = p_values
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .map(|(i, &p)| (i, p))
        .collect();

    let m = ranked.len();
    if m == 0 {
        return Ok(adjusted);
    }

    // Stable sort keeps tied p-values in encounter order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut lowest_seen = f64::INFINITY;
    let mut found_significant = false;

    for (offset, &(original_index, p_value)) in ranked.iter().enumerate() {
        // Rank m for the largest p-value, down to 1 for the smallest.
        let rank = m - offset;
        let candidate = p_value * m as f64 / rank as f64;
        if candidate < lowest_seen {
            lowest_seen = candidate;
        }

        let significant = if found_significant {
            // The scan moves toward smaller p-values and lowest_seen is
            // non-increasing, so everything after the first rejection is
            // at least as significant.
            true
        } else {
            found_significant = lowest_seen <= alpha;
            found_significant
        };

        adjusted[original_index] = AdjustedPValue {
            p_adjusted: lowest_seen,
            significant,
        };
    }

    Ok(adjusted)
}

/// Apply the Bonferroni correction and decide significance at `alpha`.
///
/// Each finite p-value is multiplied by the number of finite p-values,
/// capped at 1. Conservative but simple; NaN handling matches
/// [`benjamini_hochberg`].
///
/// # Errors
///
/// Fails when `alpha` is outside (0, 1) or any non-NaN p-value is outside
/// [0, 1].
pub fn bonferroni(p_values: &[f64], alpha: f64) -> Result<Vec<AdjustedPValue>> {
    check_alpha(alpha)?;
    check_p_values(p_values)?;

    let m = p_values.iter().filter(|p| !p.is_nan()).count();

    Ok(p_values
        .iter()
        .map(|&p| {
            if p.is_nan() {
                AdjustedPValue {
                    p_adjusted: f64::NAN,
                    significant: false,
                }
            } else {
                let p_adjusted = (p * m as f64).min(1.0);
                AdjustedPValue {
                    p_adjusted,
                    significant: p_adjusted <= alpha,
                }
            }
        })
        .collect())
}

pub(crate) fn check_alpha(alpha: f64) -> Result<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(StatsError::InvalidAlpha { alpha });
    }
    Ok(())
}

fn check_p_values(p_values: &[f64]) -> Result<()> {
    for (index, &value) in p_values.iter().enumerate() {
        if !value.is_nan() && !(0.0..=1.0).contains(&value) {
            return Err(StatsError::InvalidPValue { index, value });
        }
    }
    Ok(())
}
