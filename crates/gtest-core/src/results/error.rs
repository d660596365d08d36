//! Result parsing and failure classification errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while classifying one failure message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The leading `file:line` prefix is missing or unparsable.
    #[error("Failure message has no file:line prefix: {0:?}")]
    MalformedLocation(String),
}

/// Errors while evaluating a run's result output.
#[derive(Debug, Error)]
pub enum ResultError {
    /// Result file missing after execution.
    #[error("Result file unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Result file is not a valid gtest JSON report.
    #[error("Result file malformed at {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A requested test has no record in the report.
    #[error("No result recorded for {id}")]
    OutcomeMissing { id: String },

    /// The failure message of a test could not be classified.
    #[error("Cannot classify failure of {id}: {source}")]
    Classify {
        id: String,
        #[source]
        source: ClassifyError,
    },
}

impl ResultError {
    /// Canonical id the error belongs to, for per-test errors.
    pub fn test_id(&self) -> Option<&str> {
        match self {
            ResultError::OutcomeMissing { id } | ResultError::Classify { id, .. } => Some(id),
            _ => None,
        }
    }
}
