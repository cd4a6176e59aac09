//! End-to-end comparison pipeline.
//!
//! Orchestrates the comparator and the FDR correction over two measurement
//! groups, joins the outcome with externally supplied entity annotation, and
//! derives summary counts. Annotation content is injected at construction
//! time; the pipeline itself holds no global state and owns no I/O.

use crate::error::{Result, StatsError};
use crate::testing::{
    AdjustedPValue, ComparisonResult, DEFAULT_ALPHA, EntityPolicy, MeasurementGroup, compare,
    correction,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Immutable per-entity annotation supplied by an external collaborator
/// (e.g. gene or protein descriptions keyed by the entity id).
///
/// Every row carries one string field per declared column. Entities missing
/// from the table are joined as nulls, never dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationTable {
    columns: Vec<String>,
    rows: HashMap<String, Vec<String>>,
}

impl AnnotationTable {
    pub fn new(columns: Vec<String>) -> Self {
        AnnotationTable {
            columns,
            rows: HashMap::new(),
        }
    }

    /// Add or replace the annotation row for one entity.
    ///
    /// # Errors
    ///
    /// Fails when the field count does not match the declared columns.
    pub fn insert(&mut self, entity_id: impl Into<String>, fields: Vec<String>) -> Result<()> {
        if fields.len() != self.columns.len() {
            return Err(StatsError::DimensionMismatch {
                expected: format!("{} annotation fields", self.columns.len()),
                got: format!("{} annotation fields", fields.len()),
            });
        }
        self.rows.insert(entity_id.into(), fields);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, entity_id: &str) -> Option<&[String]> {
        self.rows.get(entity_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Two-group differential-abundance pipeline: compare, correct, annotate.
///
/// Construction fails fast on an invalid significance level; entity-set
/// reconciliation is strict unless the intersect policy is opted into.
#[derive(Debug, Clone)]
pub struct ComparisonPipeline {
    alpha: f64,
    policy: EntityPolicy,
    annotation: Option<AnnotationTable>,
}

impl ComparisonPipeline {
    /// Create a pipeline rejecting at the given significance level.
    ///
    /// # Errors
    ///
    /// Fails when `alpha` is outside (0, 1).
    pub fn new(alpha: f64) -> Result<Self> {
        correction::check_alpha(alpha)?;
        Ok(ComparisonPipeline {
            alpha,
            policy: EntityPolicy::Strict,
            annotation: None,
        })
    }

    /// Pipeline with the default significance level of 0.05.
    pub fn with_default_alpha() -> Self {
        ComparisonPipeline {
            alpha: DEFAULT_ALPHA,
            policy: EntityPolicy::Strict,
            annotation: None,
        }
    }

    /// Attach an annotation table to left-join into the result.
    pub fn with_annotation(mut self, annotation: AnnotationTable) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Choose how mismatched entity sets are reconciled.
    pub fn with_entity_policy(mut self, policy: EntityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Run the comparison: per-entity lfc and Welch p-value, BH correction,
    /// annotation join. Row order in the output equals the (aligned) input
    /// entity order.
    ///
    /// # Errors
    ///
    /// Fails under the strict policy when the groups index different
    /// entities; never returns a partial result.
    pub fn run(
        &self,
        numerator: &MeasurementGroup,
        denominator: &MeasurementGroup,
    ) -> Result<ComparisonTable> {
        let (numerator, denominator) = self.align(numerator, denominator)?;

        let results = compare::compare(&numerator, &denominator)?;
        let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
        let tested = p_values.iter().filter(|p| !p.is_nan()).count();
        log::debug!(
            "compared {} entities, {} with a defined test",
            results.len(),
            tested
        );

        let adjusted = correction::benjamini_hochberg(&p_values, self.alpha)?;
        let table = self.build_table(numerator.entity_ids(), &results, &adjusted);

        log::info!(
            "{} of {} entities significant at alpha {}",
            table.significant.iter().filter(|&&s| s).count(),
            table.n_entities(),
            self.alpha
        );
        Ok(table)
    }

    fn align<'a>(
        &self,
        numerator: &'a MeasurementGroup,
        denominator: &'a MeasurementGroup,
    ) -> Result<(Cow<'a, MeasurementGroup>, Cow<'a, MeasurementGroup>)> {
        match self.policy {
            EntityPolicy::Strict => {
                if numerator.entity_ids() != denominator.entity_ids() {
                    return Err(StatsError::EntityMismatch {
                        reason: format!(
                            "numerator indexes {} entities, denominator {}; \
                             strict policy requires identical ordered entity sets \
                             (use EntityPolicy::Intersect to join on the shared subset)",
                            numerator.n_entities(),
                            denominator.n_entities()
                        ),
                    });
                }
                Ok((Cow::Borrowed(numerator), Cow::Borrowed(denominator)))
            }
            EntityPolicy::Intersect => {
                let denominator_ids: HashSet<&str> = denominator
                    .entity_ids()
                    .iter()
                    .map(String::as_str)
                    .collect();
                let shared: Vec<String> = numerator
                    .entity_ids()
                    .iter()
                    .filter(|id| denominator_ids.contains(id.as_str()))
                    .cloned()
                    .collect();
                log::debug!(
                    "intersect policy kept {} of {} numerator entities",
                    shared.len(),
                    numerator.n_entities()
                );
                Ok((
                    Cow::Owned(numerator.select(&shared)),
                    Cow::Owned(denominator.select(&shared)),
                ))
            }
        }
    }

    fn build_table(
        &self,
        entity_ids: &[String],
        results: &[ComparisonResult],
        adjusted: &[AdjustedPValue],
    ) -> ComparisonTable {
        let annotation_columns = self
            .annotation
            .as_ref()
            .map(|a| a.columns().to_vec())
            .unwrap_or_default();

        // Left join: entities without annotation keep a row of nulls.
        let annotations = entity_ids
            .iter()
            .map(|id| match self.annotation.as_ref().and_then(|a| a.get(id)) {
                Some(fields) => fields.iter().cloned().map(Some).collect(),
                None => vec![None; annotation_columns.len()],
            })
            .collect();

        ComparisonTable {
            entity_ids: entity_ids.to_vec(),
            lfc: results.iter().map(|r| r.lfc).collect(),
            p_values: results.iter().map(|r| r.p_value).collect(),
            p_adjusted: adjusted.iter().map(|a| a.p_adjusted).collect(),
            significant: adjusted.iter().map(|a| a.significant).collect(),
            alpha: self.alpha,
            annotation_columns,
            annotations,
        }
    }
}

/// Result table of one pipeline run, one row per entity in input order.
///
/// Columns are stored as parallel vectors so export collaborators can stream
/// them straight into CSV or spreadsheet writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub entity_ids: Vec<String>,
    /// Log2 fold change per entity
    pub lfc: Vec<f64>,
    /// Raw Welch p-values (NaN where the test was undefined)
    pub p_values: Vec<f64>,
    /// BH-adjusted p-values (NaN where the raw p-value was NaN)
    pub p_adjusted: Vec<f64>,
    /// Reject decision at `alpha`
    pub significant: Vec<bool>,
    /// Significance level the decisions were made at
    pub alpha: f64,
    /// Annotation column names (empty when no table was attached)
    pub annotation_columns: Vec<String>,
    /// One annotation row per entity; `None` fields mark missing entities
    pub annotations: Vec<Vec<Option<String>>>,
}

impl ComparisonTable {
    pub fn n_entities(&self) -> usize {
        self.entity_ids.len()
    }

    /// Entities rejected by the FDR correction.
    pub fn significant_entities(&self) -> Vec<&str> {
        self.entity_ids
            .iter()
            .zip(&self.significant)
            .filter(|&(_, &s)| s)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Significant entities with `lfc >= min_lfc`.
    pub fn upregulated(&self, min_lfc: f64) -> Vec<&str> {
        self.entity_ids
            .iter()
            .zip(self.significant.iter().zip(&self.lfc))
            .filter(|&(_, (&s, &lfc))| s && lfc >= min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Significant entities with `lfc <= -min_lfc`.
    pub fn downregulated(&self, min_lfc: f64) -> Vec<&str> {
        self.entity_ids
            .iter()
            .zip(self.significant.iter().zip(&self.lfc))
            .filter(|&(_, (&s, &lfc))| s && lfc <= -min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Summary counts at the default raw-p cutoff of `-log10(0.05)`.
    ///
    /// `subclass` is an externally supplied set of entity ids (e.g. a
    /// biological subclass); pass an empty set when no split is wanted.
    pub fn summary(&self, subclass: &HashSet<String>) -> ComparisonSummary {
        self.summary_at(-DEFAULT_ALPHA.log10(), subclass)
    }

    /// Summary counts at a caller-chosen `-log10(p)` cutoff.
    ///
    /// Counts entities with `-log10(p_value) > cutoff`, split by the sign of
    /// the fold change and by subclass membership. The reduction uses the raw
    /// p-values, matching the legacy report; adjusted significance is carried
    /// separately in the table.
    pub fn summary_at(&self, cutoff: f64, subclass: &HashSet<String>) -> ComparisonSummary {
        let mut summary = ComparisonSummary {
            total_entities: self.n_entities(),
            entities_tested: self.p_values.iter().filter(|p| !p.is_nan()).count(),
            cutoff,
            up: 0,
            down: 0,
            up_in_subclass: 0,
            down_in_subclass: 0,
        };

        for ((id, &p), &lfc) in self
            .entity_ids
            .iter()
            .zip(&self.p_values)
            .zip(&self.lfc)
        {
            // Undefined tests never count toward the report
            if p.is_nan() || -p.log10() <= cutoff {
                continue;
            }
            let in_subclass = subclass.contains(id);
            if lfc > 0.0 {
                summary.up += 1;
                if in_subclass {
                    summary.up_in_subclass += 1;
                }
            } else if lfc < 0.0 {
                summary.down += 1;
                if in_subclass {
                    summary.down_in_subclass += 1;
                }
            }
        }

        summary
    }
}

/// Reduction over one comparison table; no new statistics, just counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_entities: usize,
    /// Entities whose test was defined (non-NaN raw p-value)
    pub entities_tested: usize,
    /// Cutoff on the -log10(p) scale
    pub cutoff: f64,
    pub up: usize,
    pub down: usize,
    pub up_in_subclass: usize,
    pub down_in_subclass: usize,
}

impl std::fmt::Display for ComparisonSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Comparison summary")?;
        writeln!(f, "==================")?;
        writeln!(f, "Total entities: {}", self.total_entities)?;
        writeln!(f, "Entities tested: {}", self.entities_tested)?;
        writeln!(f, "-log10(p) > {:.3}:", self.cutoff)?;
        writeln!(f, "  Up: {} ({} in subclass)", self.up, self.up_in_subclass)?;
        writeln!(
            f,
            "  Down: {} ({} in subclass)",
            self.down, self.down_in_subclass
        )?;
        Ok(())
    }
}
