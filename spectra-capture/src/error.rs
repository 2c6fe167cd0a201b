use thiserror::Error;

/// Why a document was rejected as a capture file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatIssue {
    #[error("Only JSON files are supported")]
    UnsupportedExtension,
    #[error("Invalid JSON: {0}")]
    MalformedJson(String),
    #[error("Invalid capture file: missing tensor_order or trials")]
    MissingCaptureKeys,
    #[error("Invalid capture file: {0}")]
    Structure(String),
}

/// Errors raised by collector control operations and capture parsing.
///
/// The observation hot path never returns these: faults there are logged and swallowed.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid collector state: {0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidFormat(#[from] FormatIssue),
    #[error("Collector state lock is poisoned")]
    Poisoned,
}
