//! Error types for langbridge
//!
//! This module provides a unified error handling strategy using `thiserror`
//! for the structured variants the LSP client runtime can recover from or
//! must report precisely, and `anyhow` for context-carrying propagation of
//! anything else.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The primary error type for langbridge operations
#[derive(Error, Debug)]
pub enum Error {
    // ===== Input validation =====
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Expected a file, got a directory: {path}")]
    ExpectedFile { path: PathBuf },

    #[error("Invalid file encoding in {path}: expected UTF-8")]
    InvalidEncoding { path: PathBuf },

    #[error("No language server configured for: {language}")]
    NoLanguageServer { language: String },

    // ===== Transport / protocol =====
    #[error("Transport closed unexpectedly: {reason}")]
    TransportClosed { reason: String },

    #[error("Malformed LSP frame or JSON-RPC envelope: {0}")]
    ProtocolError(String),

    // ===== Server lifecycle =====
    #[error("Language server failed to start: {reason}")]
    ServerStartupFailed { reason: String },

    #[error("Language server crashed: {language}")]
    ServerCrashed { language: String },

    #[error("Language server is shutting down")]
    ServerShuttingDown,

    // ===== Request lifecycle =====
    #[error("Request timed out after {elapsed:?}: {method}")]
    Timeout { method: String, elapsed: Duration },

    #[error("Request cancelled: {method}")]
    Cancelled { method: String },

    #[error("Language server returned error {code} for {method}: {message}")]
    ServerError { method: String, code: i64, message: String },

    #[error("Language server does not support this request: {method}")]
    Unsupported { method: String },

    // ===== Generic =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error kind for categorizing errors (used by callers that triage by class
/// rather than matching every variant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Transport,
    Lifecycle,
    Request,
    Internal,
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileNotFound { .. }
            | Error::ExpectedFile { .. }
            | Error::InvalidEncoding { .. }
            | Error::NoLanguageServer { .. } => ErrorKind::Validation,

            Error::TransportClosed { .. } | Error::ProtocolError(_) => ErrorKind::Transport,

            Error::ServerStartupFailed { .. }
            | Error::ServerCrashed { .. }
            | Error::ServerShuttingDown => ErrorKind::Lifecycle,

            Error::Timeout { .. }
            | Error::Cancelled { .. }
            | Error::ServerError { .. }
            | Error::Unsupported { .. } => ErrorKind::Request,

            Error::Io(_) | Error::Json(_) | Error::Internal(_) | Error::Other(_) => {
                ErrorKind::Internal
            },
        }
    }

    /// Whether this error represents a fatal condition for the owning
    /// `ServerConnection` (it should transition to a terminal state and
    /// poison subsequent calls) as opposed to one scoped to a single
    /// request.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Lifecycle)
            && !matches!(self, Error::ServerShuttingDown)
    }

    /// Check if this error is recoverable by simply retrying the call
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Cancelled { .. } | Error::FileNotFound { .. }
        )
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context lazily
    fn with_context<C, F>(self, f: F) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Other(anyhow::Error::from(e).context(context)))
    }

    fn with_context<C, F>(self, f: F) -> crate::Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Other(anyhow::Error::from(e).context(f())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = Error::FileNotFound {
            path: PathBuf::from("/test"),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = Error::ServerCrashed { language: "rust".into() };
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_recoverable() {
        let recoverable = Error::Timeout {
            method: "textDocument/references".into(),
            elapsed: Duration::from_secs(5),
        };
        assert!(recoverable.is_recoverable());

        let not_recoverable = Error::Internal("test".to_string());
        assert!(!not_recoverable.is_recoverable());
    }

    #[test]
    fn test_shutting_down_not_fatal() {
        assert!(!Error::ServerShuttingDown.is_fatal());
    }
}
