//! Fatal error taxonomy shared by both pipelines
//!
//! Only configuration problems are fatal. Per-item data problems (missing
//! reports, failed downloads, empty buckets) are logged and recovered where
//! they occur and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code when the output directory does not exist
pub const EXIT_MISSING_OUTPUT: i32 = 20;

/// Exit code when a required input (results tree, catalog index) is unavailable
pub const EXIT_MISSING_INPUT: i32 = 30;

/// Exit code for every other fatal error
pub const EXIT_FAILURE: i32 = 1;

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Provided output directory ({0}) does not exist.")]
    MissingOutputDirectory(PathBuf),

    #[error("Provided results directory ({0}) does not exist.")]
    MissingResultsDirectory(PathBuf),

    #[error("Error downloading app index file from {url}: {reason}")]
    IndexDownload { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse app index {path}: {source}")]
    IndexFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudyError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            StudyError::MissingOutputDirectory(_) => EXIT_MISSING_OUTPUT,
            StudyError::MissingResultsDirectory(_) | StudyError::IndexDownload { .. } => {
                EXIT_MISSING_INPUT
            }
            _ => EXIT_FAILURE,
        }
    }
}

/// Resolve the exit code for an error bubbled up through `anyhow`
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StudyError>())
        .map(StudyError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
