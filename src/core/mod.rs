//! Similarity clustering core.
//!
//! Everything under this module is pure: no file access, no console output.
//! - `descriptor`: per-image feature vectors and their metric
//! - `scorer`: ratio-tested good match counting
//! - `table`: append-only cluster storage
//! - `engine`: the single-pass first-fit assignment
//! - `report`: mapping clusters back to source identifiers

pub mod descriptor;
pub mod engine;
pub mod report;
pub mod scorer;
pub mod table;

use thiserror::Error;

use crate::core::descriptor::Metric;

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Item {index} uses {found} descriptors but the run uses {expected}")]
    MetricMismatch {
        index: usize,
        expected: Metric,
        found: Metric,
    },

    #[error("Item {index} has {found}-wide descriptors but the run uses {expected}")]
    WidthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("No identifier for item {index} (only {len} provided)")]
    MissingIdentifier { index: usize, len: usize },

    #[error("Operation cancelled after {processed} items")]
    Cancelled { processed: usize },
}
