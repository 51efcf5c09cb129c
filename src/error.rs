//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::fmt;
use std::path::{Path, PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::cache::TypeTag;

// == Error Kind ==
/// Coarse classification of a [`CacheError`], for branching without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyKey,
    PointerNotAllowed,
    NotFound,
    TypeMismatch,
    OutOfRange,
    Cancelled,
    DeadlineExceeded,
    Serialization,
    Io,
    Internal,
}

// == Log Action ==
/// The file operation that failed inside the command log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Open,
    Read,
    Write,
    Flush,
    Rename,
    Compress,
    Remove,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogAction::Open => "open",
            LogAction::Read => "read",
            LogAction::Write => "write",
            LogAction::Flush => "flush",
            LogAction::Rename => "rename",
            LogAction::Compress => "compress",
            LogAction::Remove => "remove",
        };
        f.write_str(name)
    }
}

// == Cache Error Enum ==
/// Unified error type for the cache and its command log.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or whitespace only
    #[error("Key cannot be empty")]
    EmptyKey,

    /// Value kind cannot be stored (sequences, byte slices, optionals)
    #[error("Value of kind {0} cannot be stored")]
    PointerNotAllowed(String),

    /// Key not found in cache (or lazily expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored kind is incompatible with the requested conversion
    #[error("Type mismatch for key {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: TypeTag,
    },

    /// Conversion or increment does not fit the target type
    #[error("Value for key {key} is out of range for {target}")]
    OutOfRange { key: String, target: &'static str },

    /// Context was cancelled before the operation started
    #[error("Operation cancelled")]
    Cancelled,

    /// Context deadline passed before the operation started
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Object payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),


    /// Command log file operation failed
    #[error("Command log {action} failed for {}: {source}", path.display())]
    Log {
        action: LogAction,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blocking worker running a cache call panicked or was cancelled
    #[error("Cache worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl CacheError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::EmptyKey => ErrorKind::EmptyKey,
            CacheError::PointerNotAllowed(_) => ErrorKind::PointerNotAllowed,
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            CacheError::OutOfRange { .. } => ErrorKind::OutOfRange,
            CacheError::Cancelled => ErrorKind::Cancelled,
            CacheError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            CacheError::Serialization(_) => ErrorKind::Serialization,
            CacheError::Log { .. } => ErrorKind::Io,
            CacheError::Worker(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn type_mismatch(key: &str, expected: &'static str, found: TypeTag) -> Self {
        CacheError::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }

    pub(crate) fn out_of_range(key: &str, target: &'static str) -> Self {
        CacheError::OutOfRange {
            key: key.to_string(),
            target,
        }
    }

    /// Builds a `map_err` adapter tagging an I/O error with the failed action and file.
    pub(crate) fn log(action: LogAction, path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| CacheError::Log {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::EmptyKey
            | ErrorKind::PointerNotAllowed
            | ErrorKind::Serialization => StatusCode::BAD_REQUEST,
            ErrorKind::TypeMismatch => StatusCode::CONFLICT,
            ErrorKind::OutOfRange => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
