//! One-shot test mail for checking relay settings.

use anyhow::Context;
use tracing::info;

use sitecheck_core::Config;
use sitecheck_notify::{Mail, MailSender};

pub async fn run(config: Config, to: Option<String>) -> anyhow::Result<()> {
    let sender = crate::smtp_sender(&config).await?;

    let mail = Mail {
        from: config.email.from.clone(),
        to: match to {
            Some(to) => vec![to],
            None => config.email.to.clone(),
        },
        subject: config.email.subject.clone(),
        body: "test".to_string(),
    };

    info!(relay = %sender.relay(), from = %mail.from, to = ?mail.to, "sending test mail");
    sender.send(&mail).await.context("failed to send test mail")?;
    info!("test mail sent");
    Ok(())
}
