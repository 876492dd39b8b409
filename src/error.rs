// ⚠️ Error taxonomy - row faults recover locally, index + batch faults surface

use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Row or reference-row shape invalid (recovered per row)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Normalization / classification / matching failed for one row
    #[error("Processing error: {0}")]
    Processing(String),

    /// Alias chain did not reach a terminal entry within the hop budget
    #[error("Data integrity error: alias chain for '{key}' exceeded {hops} hops")]
    DataIntegrity { key: String, hops: usize },

    /// Batch did not finish before its deadline; no rows are returned
    #[error("Batch timeout after {timeout_secs:.1}s: {completed} completed, {pending} pending")]
    BatchTimeout {
        completed: usize,
        pending: usize,
        timeout_secs: f64,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MatchError {
    /// Row-level faults are caught at the row boundary; everything else is fatal
    pub fn is_row_fault(&self) -> bool {
        matches!(self, MatchError::Validation(_) | MatchError::Processing(_))
    }
}
