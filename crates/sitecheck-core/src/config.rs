//! sitecheck.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{SiteFilter, active_only, all_sites};

pub const DEFAULT_MGRCTL_PATH: &str = "/usr/local/mgr5/sbin/mgrctl";
pub const DEFAULT_WWW_ROOT: &str = "/var/www";
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_EXPECTED_STATUS: u16 = 401;
pub const DEFAULT_SMTP_PORT: u16 = 25;

const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const DEFAULT_RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Raw file layout; every field is optional so defaults can be applied.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    mgrctl_path: Option<PathBuf>,
    www_root: Option<PathBuf>,
    scrape_interval: Option<String>,
    workers: Option<usize>,
    expected_status: Option<u16>,
    check_inactive: Option<bool>,
    send_interval: Option<String>,
    send_timeout: Option<String>,
    repeat_interval: Option<String>,
    retention_period: Option<String>,
    #[serde(default)]
    smtp: RawSmtp,
    #[serde(default)]
    email: RawEmail,
}

#[derive(Debug, Default, Deserialize)]
struct RawSmtp {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    use_tls: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEmail {
    from: Option<String>,
    #[serde(default)]
    to: Vec<String>,
    subject: Option<String>,
}

/// Fully resolved configuration with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mgrctl_path: PathBuf,
    pub www_root: PathBuf,
    pub scrape_interval: Duration,
    pub workers: usize,
    /// Status code a correctly locked-down site answers with.
    pub expected_status: u16,
    /// Probe domains the control plane reports as disabled too.
    pub check_inactive: bool,
    pub send_interval: Duration,
    pub send_timeout: Duration,
    pub repeat_interval: Duration,
    pub retention_period: Duration,
    pub smtp: SmtpConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    /// `None` means "derive from the sender's domain".
    pub host: Option<String>,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// When false, certificate validation is skipped.
    pub use_tls: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

impl Config {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Filter deciding which domains get probed.
    pub fn site_filter(&self) -> SiteFilter {
        if self.check_inactive {
            all_sites()
        } else {
            active_only()
        }
    }

    fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let workers = raw.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be greater than zero".to_string(),
            });
        }

        let expected_status = raw.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS);
        if !(100..=599).contains(&expected_status) {
            return Err(ConfigError::Invalid {
                field: "expected_status",
                reason: format!("{expected_status} is not an HTTP status code"),
            });
        }

        let smtp = SmtpConfig {
            host: raw.smtp.host.filter(|h| !h.trim().is_empty()),
            port: raw.smtp.port.unwrap_or(DEFAULT_SMTP_PORT),
            username: required(raw.smtp.username, "smtp.username")?,
            password: required(raw.smtp.password, "smtp.password")?,
            use_tls: raw.smtp.use_tls.unwrap_or(true),
        };

        let to: Vec<String> = raw
            .email
            .to
            .into_iter()
            .map(|addr| addr.trim().to_string())
            .filter(|addr| !addr.is_empty())
            .collect();
        if to.is_empty() {
            return Err(ConfigError::Missing("email.to"));
        }
        let email = EmailConfig {
            from: required(raw.email.from, "email.from")?,
            to,
            subject: required(raw.email.subject, "email.subject")?,
        };

        Ok(Self {
            mgrctl_path: raw
                .mgrctl_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MGRCTL_PATH)),
            www_root: raw.www_root.unwrap_or_else(|| PathBuf::from(DEFAULT_WWW_ROOT)),
            scrape_interval: interval(
                raw.scrape_interval,
                "scrape_interval",
                DEFAULT_SCRAPE_INTERVAL,
            )?,
            workers,
            expected_status,
            check_inactive: raw.check_inactive.unwrap_or(false),
            send_interval: interval(raw.send_interval, "send_interval", DEFAULT_SEND_INTERVAL)?,
            send_timeout: interval(raw.send_timeout, "send_timeout", DEFAULT_SEND_TIMEOUT)?,
            repeat_interval: interval(
                raw.repeat_interval,
                "repeat_interval",
                DEFAULT_REPEAT_INTERVAL,
            )?,
            retention_period: interval(
                raw.retention_period,
                "retention_period",
                DEFAULT_RETENTION_PERIOD,
            )?,
            smtp,
            email,
        })
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(s)?;
        Self::from_raw(raw)
    }
}

fn required(value: Option<String>, field: &'static str) -> ConfigResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(field)),
    }
}

/// Resolve an optional duration string, rejecting zero intervals.
fn interval(
    value: Option<String>,
    field: &'static str,
    default: Duration,
) -> ConfigResult<Duration> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_duration(&value) {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::Duration { field, value }),
    }
}

/// Parse a duration string like "500ms", "5s", "1m", "6h" or "1h30m".
///
/// A bare number is taken as seconds. Values that overflow yield `None`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if s.is_empty() {
        return None;
    }

    let mut total_ms: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let (unit_ms, unit_len) = if rest.starts_with("ms") {
            (1, 2)
        } else if rest.starts_with('s') {
            (1_000, 1)
        } else if rest.starts_with('m') {
            (60_000, 1)
        } else if rest.starts_with('h') {
            (3_600_000, 1)
        } else {
            return None;
        };
        rest = &rest[unit_len..];
        total_ms = total_ms.checked_add(value.checked_mul(unit_ms)?)?;
    }

    Some(Duration::from_millis(total_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
scrape_interval = "60s"
mgrctl_path = "/usr/local/mgr5/sbin/mgrctl"
workers = 4
expected_status = 403
check_inactive = true
send_interval = "30s"
send_timeout = "5s"
repeat_interval = "3h"
retention_period = "48h"

[smtp]
username = "test@test.tu"
password = "hello-world"
host = "mail.yandex.ru"
port = 465

[email]
to = ["test@example.com"]
subject = "subject"
from = "test@test.tu"
"#;

    const MINIMAL: &str = r#"
[smtp]
username = "test@test.tu"
password = "hello-world"

[email]
to = ["test@example.com"]
subject = "subject"
from = "test@test.tu"
"#;

    #[test]
    fn parses_full_config() {
        let cfg: Config = FULL.parse().unwrap();
        assert_eq!(cfg.mgrctl_path, PathBuf::from("/usr/local/mgr5/sbin/mgrctl"));
        assert_eq!(cfg.scrape_interval, Duration::from_secs(60));
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.expected_status, 403);
        assert!(cfg.check_inactive);
        assert_eq!(cfg.send_interval, Duration::from_secs(30));
        assert_eq!(cfg.send_timeout, Duration::from_secs(5));
        assert_eq!(cfg.repeat_interval, Duration::from_secs(3 * 3600));
        assert_eq!(cfg.retention_period, Duration::from_secs(48 * 3600));
        assert_eq!(cfg.smtp.host.as_deref(), Some("mail.yandex.ru"));
        assert_eq!(cfg.smtp.port, 465);
        assert_eq!(cfg.smtp.username, "test@test.tu");
        assert_eq!(cfg.smtp.password, "hello-world");
        assert_eq!(cfg.email.from, "test@test.tu");
        assert_eq!(cfg.email.to, vec!["test@example.com".to_string()]);
        assert_eq!(cfg.email.subject, "subject");
    }

    #[test]
    fn applies_defaults() {
        let cfg: Config = MINIMAL.parse().unwrap();
        assert_eq!(cfg.mgrctl_path, PathBuf::from(DEFAULT_MGRCTL_PATH));
        assert_eq!(cfg.www_root, PathBuf::from(DEFAULT_WWW_ROOT));
        assert_eq!(cfg.scrape_interval, Duration::from_secs(60));
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        assert_eq!(cfg.expected_status, 401);
        assert!(!cfg.check_inactive);
        assert_eq!(cfg.send_interval, Duration::from_secs(60));
        assert_eq!(cfg.send_timeout, Duration::from_secs(2));
        assert_eq!(cfg.repeat_interval, Duration::from_secs(6 * 3600));
        assert_eq!(cfg.retention_period, Duration::from_secs(24 * 3600));
        assert_eq!(cfg.smtp.host, None);
        assert_eq!(cfg.smtp.port, DEFAULT_SMTP_PORT);
        assert!(cfg.smtp.use_tls);
    }

    #[test]
    fn rejects_missing_recipient() {
        let err = r#"
[smtp]
username = "test@test.tu"
password = "hello-world"

[email]
subject = "subject"
from = "test@test.tu"
"#
        .parse::<Config>()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("email.to")));
    }

    #[test]
    fn rejects_missing_smtp_credentials() {
        let err = r#"
[email]
to = ["test@example.com"]
subject = "subject"
from = "test@test.tu"
"#
        .parse::<Config>()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("smtp.username")));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = format!("workers = 0\n{MINIMAL}").parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "workers", .. }));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = format!("scrape_interval = \"soon\"\n{MINIMAL}")
            .parse::<Config>()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Duration {
                field: "scrape_interval",
                ..
            }
        ));

        let err = format!("send_interval = \"0s\"\n{MINIMAL}")
            .parse::<Config>()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Duration { .. }));
    }

    #[test]
    fn rejects_out_of_range_status() {
        let err = format!("expected_status = 42\n{MINIMAL}")
            .parse::<Config>()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "expected_status",
                ..
            }
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn site_filter_follows_check_inactive() {
        let mut cfg: Config = MINIMAL.parse().unwrap();
        let inactive = crate::ManagedSite {
            id: 1,
            owner: "o".to_string(),
            name: "n".to_string(),
            docroot: String::new(),
            active: false,
            address: "127.0.0.1".to_string(),
            port: 80,
            sites: vec!["n".to_string()],
        };
        assert!(!cfg.site_filter()(&inactive));
        cfg.check_inactive = true;
        assert!(cfg.site_filter()(&inactive));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("6h"), Some(Duration::from_secs(6 * 3600)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("later"), None);
    }

    #[test]
    fn parse_duration_compound() {
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1m30s500ms"), Some(Duration::from_millis(90_500)));
        assert_eq!(parse_duration("1h30"), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn parse_duration_rejects_overflow() {
        assert_eq!(parse_duration("18446744073709551615h"), None);
        assert_eq!(parse_duration("5124095576030431m"), None);
        assert_eq!(parse_duration("18446744073709551615h1s"), None);
    }

    #[test]
    fn oversized_interval_is_config_error() {
        let toml = MINIMAL.replace("[smtp]", "repeat_interval = \"99999999999999999h\"\n\n[smtp]");
        assert!(matches!(
            toml.parse::<Config>(),
            Err(ConfigError::Duration { field: "repeat_interval", .. })
        ));
    }
}
