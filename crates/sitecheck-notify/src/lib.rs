//! sitecheck-notify — alert state and mail delivery.
//!
//! [`NotificationEngine`] turns a stream of per-site verdicts into
//! deduplicated, batched mails. Delivery goes through the [`MailSender`]
//! trait; [`SmtpMailSender`] is the production transport.

pub mod discovery;
pub mod error;
pub mod mail;
pub mod notifier;
pub mod smtp;

pub use discovery::{DnsResolver, RelayResolver, discover_smtp_host};
pub use error::{MailError, MailResult, NotifyError, NotifyResult};
pub use mail::{Mail, MailSender, build_message, parse_mailbox};
pub use notifier::{
    MESSAGE_SEPARATOR, NotificationEngine, Notifier, NotifierSettings, SiteNotification,
    SiteStatus,
};
pub use smtp::SmtpMailSender;
