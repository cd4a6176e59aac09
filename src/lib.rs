//! # abundance-statistics
//!
//! A Rust library for differential-abundance analysis of biological
//! measurement tables, such as peptide or protein intensities exported by
//! proteomics search engines.
//!
//! The crate compares two groups of log2-scaled replicate measurements
//! entity by entity and corrects the resulting family of hypothesis tests
//! for multiple comparisons. It owns no file formats, rendering, or domain
//! database content; callers feed it two aligned numeric tables keyed by
//! entity id and receive a result table keyed the same way.
//!
//! ## Core Features
//!
//! - **Differential Abundance**: per-entity log2 fold changes and two-sided
//!   Welch t-tests over replicate columns
//! - **Multiple Testing Correction**: Benjamini-Hochberg FDR control with
//!   per-entity reject decisions (Bonferroni available as well)
//! - **Pipeline**: comparison → correction → annotation join → summary
//!   counts, with typed configuration errors and NaN propagation for
//!   degenerate measurements
//!
//! ## Quick Start
//!
//! Build two [`MeasurementGroup`]s sharing one ordered entity index, then run
//! a [`ComparisonPipeline`] to obtain a [`pipeline::ComparisonTable`] with
//! `{entity_id, lfc, pval, p_adjusted, reject}` plus any joined annotation
//! columns.
//!
//! ## Module Organization
//!
//! - **[`testing`]**: comparison of measurement groups and multiple testing
//!   correction
//! - **[`pipeline`]**: end-to-end orchestration, annotation join, and
//!   summary statistics
//! - **[`error`]**: typed errors shared across the crate

pub mod error;
pub mod pipeline;
pub mod testing;

pub use error::{Result, StatsError};
pub use pipeline::{AnnotationTable, ComparisonPipeline, ComparisonSummary, ComparisonTable};
pub use testing::{
    AdjustedPValue, ComparisonResult, DEFAULT_ALPHA, EntityPolicy, MeasurementGroup,
};
