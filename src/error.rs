//! Domain errors raised by the scoring pipeline

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::score::Metric;

/// Failures of a single recomputation cycle.
///
/// None of these leave partial state behind: the pipeline either returns a
/// complete table or one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RfmError {
    /// The active filter matched zero orders.
    #[error("insufficient data: no orders match the active filter")]
    InsufficientData,

    /// Fewer customers than quintile bins.
    #[error("insufficient population for quintile scoring of {metric}: {customers} customers, need at least 5")]
    InsufficientPopulation { metric: Metric, customers: usize },

    /// Too many repeated values to cut five non-empty quintiles.
    #[error("insufficient distinct {metric} values for quintile scoring across {customers} customers")]
    InsufficientDistinctValues { metric: Metric, customers: usize },

    /// A required column is absent from the input file.
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    /// A digit score outside 1..=5.
    #[error("invalid score {0}: must be between 1 and 5")]
    InvalidScore(u8),

    /// A group-by or join over the order frame failed.
    #[error("frame operation failed: {0}")]
    Frame(String),
}

impl From<PolarsError> for RfmError {
    fn from(err: PolarsError) -> Self {
        RfmError::Frame(err.to_string())
    }
}
