use std::{io, path::PathBuf};

use spectra_capture::{CaptureError, FormatIssue};
use thiserror::Error;

/// Errors reported by capture queries.
#[derive(Debug, Error)]
pub enum SpectraError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidFormat(FormatIssue),
    #[error("Unknown model family: {0}")]
    UnknownFamily(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SpectraError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SpectraError::Io { path: path.into(), source }
    }
}

impl From<FormatIssue> for SpectraError {
    fn from(issue: FormatIssue) -> Self {
        SpectraError::InvalidFormat(issue)
    }
}

impl From<CaptureError> for SpectraError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::InvalidFormat(issue) => SpectraError::InvalidFormat(issue),
            CaptureError::InvalidState(message) => SpectraError::InvalidState(message),
            CaptureError::Poisoned => SpectraError::InvalidState(CaptureError::Poisoned.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpectraError>;
