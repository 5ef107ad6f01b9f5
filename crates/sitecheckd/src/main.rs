//! sitecheckd — the sitecheck daemon.
//!
//! Periodically asks ISPmanager for its web domains, probes every hosted
//! site on its backend and mails an alert when a site stops answering
//! with the expected "closed" status.
//!
//! # Usage
//!
//! ```text
//! sitecheckd --config /etc/sitecheck.toml [--debug] [run]
//! sitecheckd --config /etc/sitecheck.toml sendmail [--to ops@example.com]
//! ```

mod daemon;
mod sendmail;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitecheck_core::Config;
use sitecheck_notify::{DnsResolver, SmtpMailSender, discover_smtp_host};

#[derive(Parser)]
#[command(name = "sitecheckd", about = "Hosted site access checker")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the checker until SIGINT or SIGTERM (default).
    Run,

    /// Send a single test mail through the configured relay and exit.
    Sendmail {
        /// Recipient overriding `email.to`.
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    let debug = cli.debug || matches!(command, Command::Sendmail { .. });
    let default_filter = if debug {
        "debug"
    } else {
        "info,sitecheckd=info,sitecheck=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    match command {
        Command::Run => daemon::run(config).await,
        Command::Sendmail { to } => sendmail::run(config, to).await,
    }
}

/// SMTP sender for the configured relay, discovering the host from the
/// sender address when none is set.
async fn smtp_sender(config: &Config) -> anyhow::Result<SmtpMailSender> {
    let host = match &config.smtp.host {
        Some(host) => host.clone(),
        None => {
            let resolver =
                DnsResolver::from_system_conf().context("failed to set up dns resolver")?;
            discover_smtp_host(&config.email.from, &resolver)
                .await
                .context("failed to discover smtp host")?
        }
    };

    SmtpMailSender::new(&config.smtp, &host).context("failed to set up smtp transport")
}
