//! Build manifest error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the build manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file missing or unreadable.
    #[error("Build manifest unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest rule pattern failed to compile.
    #[error("Invalid manifest pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ManifestError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::Unavailable {
            path: path.into(),
            source,
        }
    }
}
