//! SMTP delivery through lettre's async transport.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

use sitecheck_core::SmtpConfig;

use crate::error::MailResult;
use crate::mail::{Mail, MailSender, build_message};

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Upper bound on a single SMTP command round trip.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Mail sender talking to an SMTP relay with credentials.
///
/// Uses STARTTLS when the server offers it, or implicit TLS on port 465.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    relay: String,
}

impl SmtpMailSender {
    pub fn new(config: &SmtpConfig, host: &str) -> MailResult<Self> {
        let tls_params = TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(!config.use_tls)
            .build()?;
        let tls = if config.port == IMPLICIT_TLS_PORT {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Opportunistic(tls_params)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(COMMAND_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            relay: format!("{host}:{}", config.port),
        })
    }

    /// Address of the relay this sender talks to.
    pub fn relay(&self) -> &str {
        &self.relay
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, mail: &Mail) -> MailResult<()> {
        let message = build_message(mail)?;
        debug!(relay = %self.relay, recipients = mail.to.len(), "sending mail");
        self.transport.send(message).await?;
        Ok(())
    }
}
