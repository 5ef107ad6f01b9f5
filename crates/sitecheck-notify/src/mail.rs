//! Mail values and RFC 5322 message construction.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, Message};

use crate::error::{MailError, MailResult};

/// A plain-text mail ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Sender, either `user@domain` or `Name <user@domain>`.
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers mails.
///
/// Implementations must be safe to cancel: the notification engine drops
/// the returned future once the send timeout or its stop signal fires.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &Mail) -> MailResult<()>;
}

/// Build an RFC 5322 message from `mail`.
///
/// Address domains are converted to their ASCII (punycode) form; the
/// subject and display names are encoded by lettre when they are not
/// plain ASCII.
pub fn build_message(mail: &Mail) -> MailResult<Message> {
    if mail.from.trim().is_empty() {
        return Err(MailError::Invalid("sender can't be empty"));
    }
    if mail.to.is_empty() {
        return Err(MailError::Invalid("recipient list can't be empty"));
    }
    if mail.subject.trim().is_empty() {
        return Err(MailError::Invalid("subject can't be empty"));
    }
    if mail.body.is_empty() {
        return Err(MailError::Invalid("body can't be empty"));
    }

    let mut builder = Message::builder().from(parse_mailbox(&mail.from)?);
    for recipient in &mail.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    let message = builder
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())?;
    Ok(message)
}

/// Parse `user@domain` or `Name <user@domain>` into a mailbox with an
/// ASCII-only domain.
pub fn parse_mailbox(raw: &str) -> MailResult<Mailbox> {
    let raw = raw.trim();
    let invalid = |reason: &str| MailError::Address {
        address: raw.to_string(),
        reason: reason.to_string(),
    };

    let (name, addr) = match raw.rfind('<') {
        Some(open) if raw.ends_with('>') => (
            raw[..open].trim().trim_matches('"').trim(),
            raw[open + 1..raw.len() - 1].trim(),
        ),
        Some(_) => return Err(invalid("unterminated angle bracket")),
        None => ("", raw),
    };

    let (user, domain) = addr
        .rsplit_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;
    if user.is_empty() || domain.is_empty() {
        return Err(invalid("empty local part or domain"));
    }

    let domain = ascii_domain(domain).map_err(|reason| invalid(&reason))?;
    let email = Address::new(user, &domain).map_err(|e| invalid(&e.to_string()))?;
    let name = (!name.is_empty()).then(|| name.to_string());

    Ok(Mailbox::new(name, email))
}

/// Domain part of an address in its ASCII (punycode) form.
pub fn address_domain(raw: &str) -> MailResult<String> {
    Ok(parse_mailbox(raw)?.email.domain().to_string())
}

fn ascii_domain(domain: &str) -> Result<String, String> {
    idna::domain_to_ascii(domain).map_err(|e| format!("cannot encode domain: {e:?}"))
}
