//! sitecheck-core — shared types and configuration for sitecheck.
//!
//! Holds the data passed between the pipeline stages (`ManagedSite`,
//! `Task`), the TOML configuration loader, and the tick source used by
//! both the scheduler and the notification engine.

pub mod config;
pub mod ticker;
pub mod types;

pub use config::{Config, ConfigError, ConfigResult, EmailConfig, SmtpConfig, parse_duration};
pub use ticker::spawn_ticker;
pub use types::*;
