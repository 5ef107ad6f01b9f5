//! Checker and probe error types.

use std::time::Duration;

use thiserror::Error;

use sitecheck_notify::NotifyError;

/// Result type alias for checker lifecycle operations.
pub type CheckerResult<T> = Result<T, CheckerError>;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("checker already running")]
    AlreadyRunning,

    #[error("checker did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("notifier error: {0}")]
    Notifier(#[from] NotifyError),
}

/// Why a probe produced no status code.
///
/// Everything except `Cancelled` is a probe outcome and ends up in the
/// task result.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe cancelled")]
    Cancelled,

    #[error("dial {address}: i/o timeout after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    #[error("dial {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: hyper::Error,
    },

    #[error("invalid request for {site}: {source}")]
    Request {
        site: String,
        #[source]
        source: http::Error,
    },

    #[error("GET http://{site}/: {source}")]
    Send {
        site: String,
        #[source]
        source: hyper::Error,
    },

    #[error("GET http://{site}/: request timed out after {timeout:?}")]
    Timeout { site: String, timeout: Duration },
}
