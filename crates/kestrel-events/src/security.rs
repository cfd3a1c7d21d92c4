use serde::{Deserialize, Serialize};
use std::fmt;

/// How bad a detected client-side abuse is. All severities are contained
/// the same way; the severity only feeds the penalty decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

/// A client sent something it could not legitimately have sent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("security violation ({severity}): {report}")]
pub struct SecurityViolation {
    pub severity: Severity,
    pub report: String,
}

impl SecurityViolation {
    pub fn new(severity: Severity, report: impl Into<String>) -> Self {
        Self {
            severity,
            report: report.into(),
        }
    }

    pub fn mild(report: impl Into<String>) -> Self {
        Self::new(Severity::Mild, report)
    }

    pub fn moderate(report: impl Into<String>) -> Self {
        Self::new(Severity::Moderate, report)
    }

    pub fn severe(report: impl Into<String>) -> Self {
        Self::new(Severity::Severe, report)
    }
}
