// 🧾 Row Entity - one spreadsheet observation moving through the pipeline
//
// Status only moves forward: initial → checked → {existing | nonexistent |
// similarity} → error. `transition` is the only writer.

use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// ROW STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Initial,
    Checked,
    Existing,
    Nonexistent,
    SimilarityMatched,
    Error,
}

impl RowStatus {
    fn rank(&self) -> u8 {
        match self {
            RowStatus::Initial => 0,
            RowStatus::Checked => 1,
            RowStatus::Existing | RowStatus::Nonexistent | RowStatus::SimilarityMatched => 2,
            RowStatus::Error => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Initial => "initial",
            RowStatus::Checked => "checked",
            RowStatus::Existing => "existing",
            RowStatus::Nonexistent => "nonexistent",
            RowStatus::SimilarityMatched => "similarity",
            RowStatus::Error => "error",
        }
    }

    /// Statuses a row may carry when it enters a batch
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, RowStatus::Initial | RowStatus::Checked)
    }

    pub fn can_transition_to(&self, next: RowStatus) -> bool {
        next.rank() > self.rank()
    }
}

// ============================================================================
// CONFIDENCE TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Exact hit in the registry (已知单位)
    Known,

    /// 近似单位
    NearIdentical,

    /// 相似单位
    Similar,

    /// 疑似单位
    Guessed,

    /// 未知单位
    Unknown,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Known => "known",
            Tier::NearIdentical => "near-identical",
            Tier::Similar => "similar",
            Tier::Guessed => "guessed",
            Tier::Unknown => "unknown",
        }
    }
}

// ============================================================================
// ROW OUTPUT
// ============================================================================

/// Columns appended to the row by the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowOutput {
    pub tier: Option<Tier>,
    pub canonical_name: Option<String>,
    pub matched_name: Option<String>,
    pub business_type: Option<String>,

    /// Rounded to two decimals; empty for known and unknown rows
    pub similarity: Option<f64>,

    /// Human-readable cause when the row failed
    pub error: Option<String>,
}

impl RowOutput {
    /// Value of the `result` column: tier label, or the failure cause
    pub fn result_label(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        self.tier
            .map(|t| t.label().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// ============================================================================
// ROW RECORD
// ============================================================================

/// Where the row came from (workbook + sheet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file_name: String,
    pub sheet_name: String,
}

impl SourceRef {
    pub fn new(file_name: &str, sheet_name: &str) -> Self {
        SourceRef {
            file_name: file_name.to_string(),
            sheet_name: sheet_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    /// 1-based sheet position; unique within a batch
    pub position: usize,
    pub source: SourceRef,
    pub column_names: Vec<String>,
    pub row_values: Vec<String>,
    pub column_values: BTreeMap<String, String>,
    status: RowStatus,
    pub output: RowOutput,
}

impl RowRecord {
    /// Build a row from parallel header/value lists
    pub fn new(position: usize, source: SourceRef, column_names: Vec<String>, row_values: Vec<String>) -> Self {
        let column_values = column_names
            .iter()
            .cloned()
            .zip(row_values.iter().cloned())
            .collect();

        RowRecord {
            position,
            source,
            column_names,
            row_values,
            column_values,
            status: RowStatus::Initial,
            output: RowOutput::default(),
        }
    }

    /// Restore a row with a previously recorded status (e.g. re-checked sheets)
    pub fn with_status(mut self, status: RowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> RowStatus {
        self.status
    }

    pub fn column_value(&self, column: &str) -> Option<&str> {
        self.column_values.get(column).map(|v| v.as_str())
    }

    /// Move the row forward; regressions are rejected
    pub fn transition(&mut self, next: RowStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(MatchError::Processing(format!(
                "row {}: invalid status transition {} -> {}",
                self.position,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Mark the row failed and attach the cause. Always succeeds.
    pub fn fail(&mut self, cause: &MatchError) {
        if self.status.can_transition_to(RowStatus::Error) {
            self.status = RowStatus::Error;
        }
        self.output.error = Some(cause.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> RowRecord {
        RowRecord::new(
            2,
            SourceRef::new("报名表单数据.xlsx", "listing"),
            vec!["序号".to_string(), "公司".to_string()],
            vec!["1".to_string(), "平安北京分公司".to_string()],
        )
    }

    #[test]
    fn test_row_builds_column_values() {
        let row = sample_row();
        assert_eq!(row.column_value("公司"), Some("平安北京分公司"));
        assert_eq!(row.column_value("missing"), None);
        assert_eq!(row.status(), RowStatus::Initial);
    }

    #[test]
    fn test_status_moves_forward_only() {
        let mut row = sample_row();
        assert!(row.transition(RowStatus::Checked).is_ok());
        assert!(row.transition(RowStatus::Existing).is_ok());

        // Terminal outcomes are peers - no hopping between them
        assert!(row.transition(RowStatus::Nonexistent).is_err());
        assert!(row.transition(RowStatus::Initial).is_err());
        assert_eq!(row.status(), RowStatus::Existing);
    }

    #[test]
    fn test_fail_from_any_state() {
        let mut row = sample_row().with_status(RowStatus::SimilarityMatched);
        row.fail(&MatchError::Processing("boom".to_string()));
        assert_eq!(row.status(), RowStatus::Error);

        // Failing twice keeps the error status and the latest cause
        row.fail(&MatchError::Validation("again".to_string()));
        assert_eq!(row.status(), RowStatus::Error);
        assert!(row.output.result_label().contains("again"));
    }

    #[test]
    fn test_result_label() {
        let mut output = RowOutput::default();
        assert_eq!(output.result_label(), "unknown");

        output.tier = Some(Tier::Similar);
        assert_eq!(output.result_label(), "similar");
    }
}
