//! Notification and mail error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for mail construction and delivery.
pub type MailResult<T> = Result<T, MailError>;

/// Result type alias for notification engine operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised while building or sending a mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail: {0}")]
    Invalid(&'static str),

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("dns lookup failed: {0}")]
    Resolve(#[from] hickory_resolver::ResolveError),

    #[error("mail transport unavailable: {0}")]
    Unavailable(String),

    #[error("mail send timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by the notification engine.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier already running")]
    AlreadyRunning,

    #[error("notifier did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("notification delivery failed: {0}")]
    Delivery(#[from] MailError),

    #[error("notification delivery cancelled")]
    Cancelled,
}
