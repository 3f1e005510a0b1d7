//! Unified error types for offgrid.

use std::time::Duration;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types shared by the worker, the runtime and the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Network request failed before a response was received.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A critical precache entry could not be stored.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Generation id or build date could not be parsed.
    #[error("INVALID_GENERATION: {0}")]
    InvalidGeneration(String),

    /// Release description could not be read.
    #[error("RELEASE_ERROR: {0}")]
    Release(String),

    /// No proxy registration exists.
    #[error("NOT_REGISTERED: no proxy registration")]
    NotRegistered,

    /// The proxy runtime is disabled.
    #[error("UNSUPPORTED: proxy runtime is disabled")]
    Unsupported,

    /// A control call received no reply in time.
    #[error("CONTROL_TIMEOUT: no reply within {}ms", .0.as_millis())]
    ControlTimeout(Duration),

    /// The control port closed before a reply was sent.
    #[error("CONTROL_CLOSED: {0}")]
    ControlClosed(String),

    /// The worker answered a control call with a failure.
    #[error("CONTROL_FAILED: {0}")]
    ControlFailed(String),

    /// The worker task has stopped.
    #[error("WORKER_TERMINATED: {0}")]
    WorkerTerminated(String),
}

impl Error {
    /// Whether the error came from the network rather than from local state.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(format!("serialization failed: {err}"))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => -32602,
            Error::Database(_) | Error::MigrationFailed(_) => -32002,
            Error::Network(_) => -32008,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::InstallFailed { .. } => -32020,
            Error::InvalidGeneration(_) | Error::Release(_) => -32021,
            Error::NotRegistered => -32022,
            Error::Unsupported => -32023,
            Error::ControlTimeout(_) | Error::ControlClosed(_) | Error::ControlFailed(_) => -32024,
            Error::WorkerTerminated(_) => -32025,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Network("connection refused".to_string());
        assert!(err.to_string().contains("NETWORK_ERROR"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_control_timeout_display() {
        let err = Error::ControlTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "CONTROL_TIMEOUT: no reply within 5000ms");
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::NotRegistered.into();
        assert_eq!(mcp_err.code.0, -32022);

        let mcp_err: McpError = Error::InvalidUrl("nope".into()).into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_is_network() {
        assert!(Error::Network("x".into()).is_network());
        assert!(Error::FetchTimeout("x".into()).is_network());
        assert!(!Error::NotRegistered.is_network());
    }
}
