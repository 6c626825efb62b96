// pour-common/src/error.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A formula declaration could not be turned into a valid record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed field '{field}': {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("Syntax error in {format} declaration: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },
}

impl ParseError {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        ParseError::MalformedField {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ParseError::MalformedField { field, .. } => Some(field),
            ParseError::Syntax { .. } => None,
        }
    }
}

/// Fetched bytes do not hash to the declared digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Checksum mismatch: expected {expected}, got {actual}")]
pub struct ChecksumMismatch {
    pub expected: String,
    pub actual: String,
}

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("I/O error reading {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

#[derive(Error, Debug, Clone)]
pub enum UnpackError {
    #[error("Unsupported archive format for '{0}'")]
    UnsupportedFormat(String),

    #[error("Unsafe entry '{entry}' in archive '{archive}'")]
    UnsafeEntry { archive: String, entry: String },

    #[error("Corrupt archive '{archive}': {message}")]
    Corrupt { archive: String, message: String },

    #[error("I/O error unpacking: {0}")]
    Io(#[from] Arc<std::io::Error>),
}

#[derive(Error, Debug, Clone)]
pub enum InstallError {
    #[error("Source file missing from archive: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("Delegated build exited with status {status}")]
    DelegateFailed { status: i32 },

    #[error("Delegated build '{program}' timed out after {timeout:?}")]
    DelegateTimedOut { program: String, timeout: Duration },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl InstallError {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source: Arc::new(err),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum PourError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("Parse Error: {0}")]
    Parse(#[from] ParseError),

    #[error("Fetch Error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    ChecksumMismatch(#[from] ChecksumMismatch),

    #[error("Unpack Error: {0}")]
    Unpack(#[from] UnpackError),

    #[error("Install Error: {0}")]
    Install(#[from] InstallError),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Lock Error: {0}")]
    Lock(String),
}

impl From<std::io::Error> for PourError {
    fn from(err: std::io::Error) -> Self {
        PourError::Io(Arc::new(err))
    }
}

impl From<std::io::Error> for UnpackError {
    fn from(err: std::io::Error) -> Self {
        UnpackError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PourError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_field_names_the_field() {
        let err = ParseError::malformed("checksum", "not hex");
        assert_eq!(err.field(), Some("checksum"));
        assert_eq!(err.to_string(), "Malformed field 'checksum': not hex");
    }

    #[test]
    fn checksum_mismatch_carries_both_digests() {
        let err: PourError = ChecksumMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Checksum mismatch: expected aa, got bb");
    }
}
