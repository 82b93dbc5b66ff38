//! Mismatch reports.

use serde::{Deserialize, Serialize};

/// A discrepancy between an expected interaction and what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MismatchDetail {
    /// Observed message. Empty when nothing was received.
    pub actual: String,
    /// Expected message key.
    pub expected: String,
    /// Human-readable explanation.
    #[serde(rename = "mismatch")]
    pub reason: String,
}

impl MismatchDetail {
    /// Mismatch for an expected message that never arrived.
    pub fn missing(expected: &str) -> Self {
        Self {
            actual: String::new(),
            expected: expected.to_string(),
            reason: format!("expected message '{expected}', but got none"),
        }
    }
}

/// Body of `GET /sessions/{id}/mismatches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatches {
    /// Unordered mismatch list.
    pub mismatches: Vec<MismatchDetail>,
}
