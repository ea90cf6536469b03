//! Error types returned by the engine entry points.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single offending input field, named by its path in the request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldIssue {
    /// Path of the field, e.g. `cartons[2].length` or `trucks`.
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors raised before any packing work starts.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was rejected as a whole; every offending field is listed.
    #[error("invalid input: {}", join_issues(.issues))]
    InvalidInput { issues: Vec<FieldIssue> },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EngineError {
    /// Returns the field issues of an `InvalidInput` error.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            EngineError::InvalidInput { issues } => issues,
            EngineError::InvalidConfiguration(_) => &[],
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Collects field issues while walking a request.
#[derive(Debug, Default)]
pub(crate) struct IssueCollector {
    issues: Vec<FieldIssue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, message));
    }

    pub fn extend(&mut self, issues: Vec<FieldIssue>) {
        self.issues.extend(issues);
    }

    /// `Ok(())` when nothing was collected, otherwise an `InvalidInput` error.
    pub fn finish(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidInput {
                issues: self.issues,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_is_ok() {
        assert!(IssueCollector::new().finish().is_ok());
    }

    #[test]
    fn invalid_input_lists_every_field() {
        let mut collector = IssueCollector::new();
        collector.push("cartons[0].length", "must be positive, got: 0");
        collector.push("trucks", "must not be empty");

        let err = collector.finish().unwrap_err();
        assert_eq!(err.issues().len(), 2);
        let text = err.to_string();
        assert!(text.contains("cartons[0].length"));
        assert!(text.contains("trucks: must not be empty"));
    }
}
