//! Run orchestration error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessOutcome;
use crate::results::ResultError;

/// Errors that abort the sequence of one root or target.
#[derive(Debug, Error)]
pub enum RunError {
    /// The document has no build target in the manifest.
    #[error("No build target compiles {}", file.display())]
    TargetUnresolved { file: PathBuf },

    /// The build tool reported a failure.
    #[error("Build of {target} failed: {reason}")]
    BuildFailed { target: String, reason: String },

    /// The test executable could not be run.
    #[error("Execution of {target} failed: {outcome}")]
    Execution {
        target: String,
        outcome: ProcessOutcome,
    },

    /// The result directory could not be prepared.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target sequence stopped because the run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// The result output could not be evaluated.
    #[error("Evaluation failed: {0}")]
    Results(#[from] ResultError),
}
