//! Long-running checker mode.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};

use sitecheck_checker::{Checker, CheckerSettings, HttpProber};
use sitecheck_core::Config;
use sitecheck_inventory::MgrctlInventory;
use sitecheck_notify::{NotificationEngine, NotifierSettings};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(config: Config) -> anyhow::Result<()> {
    info!("sitecheckd starting");

    // ── Wire subsystems ────────────────────────────────────────

    let sender = Arc::new(crate::smtp_sender(&config).await?);
    info!(relay = %sender.relay(), "mail transport configured");

    let notifier = Arc::new(NotificationEngine::new(
        NotifierSettings::from_config(&config),
        sender,
    ));

    let inventory = Arc::new(MgrctlInventory::new(
        config.mgrctl_path.clone(),
        config.www_root.clone(),
    ));
    info!(mgrctl = %config.mgrctl_path.display(), www_root = %config.www_root.display(), "inventory source configured");

    let checker = Checker::new(
        CheckerSettings::from_config(&config),
        inventory,
        Arc::new(HttpProber::default()),
        notifier,
    );
    checker.start().context("failed to start checker")?;

    // ── Wait for shutdown ──────────────────────────────────────

    shutdown_signal().await?;
    info!("shutdown signal received");

    if let Err(e) = checker.stop(SHUTDOWN_TIMEOUT).await {
        error!(error = %e, "error during shutdown");
        return Err(e.into());
    }

    info!("sitecheckd stopped");
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => {
            interrupted.context("failed to install SIGINT handler")?;
        }
        _ = terminate.recv() => {}
    }
    Ok(())
}
