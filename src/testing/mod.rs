use crate::error::{Result, StatsError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod compare;
pub mod correction;

/// Default significance level for reject decisions.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// How the pipeline reconciles the numerator and denominator entity sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntityPolicy {
    /// Both groups must index exactly the same entities in the same order;
    /// anything else is a configuration error.
    #[default]
    Strict,
    /// Keep only entities present in both groups, in numerator order.
    /// Opt-in; entities are dropped silently under this policy.
    Intersect,
}

/// Replicate measurements for one experimental condition.
///
/// Rows are entities, columns are replicates. Values are expected to already
/// be in log2 space, so fold changes are plain differences of row means.
#[derive(Debug, Clone)]
pub struct MeasurementGroup {
    entity_ids: Vec<String>,
    values: Array2<f64>,
}

impl MeasurementGroup {
    /// Create a group from an ordered entity index and its replicate matrix.
    ///
    /// The id count must match the matrix row count and ids must be unique.
    pub fn new(entity_ids: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if entity_ids.len() != values.nrows() {
            return Err(StatsError::DimensionMismatch {
                expected: format!("{} matrix rows", entity_ids.len()),
                got: format!("{} matrix rows", values.nrows()),
            });
        }

        let mut seen = HashSet::with_capacity(entity_ids.len());
        for id in &entity_ids {
            if !seen.insert(id.as_str()) {
                return Err(StatsError::EntityMismatch {
                    reason: format!("duplicate entity id '{id}'"),
                });
            }
        }

        Ok(MeasurementGroup { entity_ids, values })
    }

    pub fn entity_ids(&self) -> &[String] {
        &self.entity_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_entities(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn n_replicates(&self) -> usize {
        self.values.ncols()
    }

    /// Restrict the group to `ids`, in the order given. Ids absent from the
    /// group are skipped.
    pub(crate) fn select(&self, ids: &[String]) -> Self {
        let index: HashMap<&str, usize> = self
            .entity_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let rows: Vec<usize> = ids
            .iter()
            .filter_map(|id| index.get(id.as_str()).copied())
            .collect();

        MeasurementGroup {
            entity_ids: rows.iter().map(|&r| self.entity_ids[r].clone()).collect(),
            values: self.values.select(Axis(0), &rows),
        }
    }
}

/// Effect size and test outcome for one entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Log2 fold change: difference of group means in log2 space
    pub lfc: f64,
    /// Two-sided Welch t-test p-value; NaN when the test is undefined
    pub p_value: f64,
}

/// Multiple-testing outcome for one entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdjustedPValue {
    /// BH-adjusted p-value; NaN when the raw p-value was NaN
    pub p_adjusted: f64,
    /// Reject decision at the correction's significance level
    pub significant: bool,
}

/// Strict entity alignment shared by the comparator entry points.
pub(crate) fn check_same_entities(
    numerator: &MeasurementGroup,
    denominator: &MeasurementGroup,
) -> Result<()> {
    if numerator.entity_ids != denominator.entity_ids {
        return Err(StatsError::EntityMismatch {
            reason: format!(
                "numerator indexes {} entities, denominator {}; both groups must share one ordered entity index",
                numerator.n_entities(),
                denominator.n_entities()
            ),
        });
    }
    Ok(())
}
