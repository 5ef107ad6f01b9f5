//! Notification engine — per-site alert state and batched delivery.
//!
//! Every probe verdict lands here as `success` or `fail`. Only status
//! transitions mark a site for notification; an unresolved failure is
//! announced again once `repeat_interval` has passed since the last mail.
//! A background loop, driven by its own ticker, collects everything due
//! and sends it as a single mail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use sitecheck_core::{Config, spawn_ticker};

use crate::error::{MailError, NotifyError, NotifyResult};
use crate::mail::{Mail, MailSender};

/// Appended after every message in a batched mail.
pub const MESSAGE_SEPARATOR: &str = "\r\n=============================\r\n";

/// Receiver of probe verdicts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Start background delivery. Fails if already started.
    fn start(&self) -> NotifyResult<()>;

    /// Record that `site` answered as expected.
    fn success(&self, site: &str, message: String);

    /// Record that `site` has a problem.
    fn fail(&self, site: &str, message: String);

    /// Stop background delivery, waiting at most `timeout`.
    async fn stop(&self, timeout: Duration) -> NotifyResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Success,
    Fail,
}

/// Alert state for one site hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteNotification {
    pub status: SiteStatus,
    /// Text sent on the next delivery.
    pub message: String,
    pub need_notify: bool,
    pub last_sent: SystemTime,
    pub last_updated: SystemTime,
}

impl SiteNotification {
    fn new(now: SystemTime) -> Self {
        Self {
            status: SiteStatus::Success,
            message: String::new(),
            need_notify: false,
            last_sent: now,
            last_updated: now,
        }
    }

    /// Apply a verdict. Returns true when the status changed.
    fn record(&mut self, status: SiteStatus, message: String, now: SystemTime) -> bool {
        self.last_updated = now;
        if self.status == status {
            return false;
        }
        self.status = status;
        self.message = message;
        self.need_notify = true;
        true
    }

    /// Resolved and already announced entries idle past `retention`.
    fn is_stale(&self, now: SystemTime, retention: Duration) -> bool {
        self.status != SiteStatus::Fail
            && !self.need_notify
            && elapsed(now, self.last_updated) >= retention
    }

    fn can_send(&self, now: SystemTime, repeat_interval: Duration) -> bool {
        self.need_notify
            || (self.status == SiteStatus::Fail && elapsed(now, self.last_sent) >= repeat_interval)
    }
}

/// Timing and addressing for the notification engine.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub send_interval: Duration,
    pub send_timeout: Duration,
    pub repeat_interval: Duration,
    pub retention_period: Duration,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

impl NotifierSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            send_interval: config.send_interval,
            send_timeout: config.send_timeout,
            repeat_interval: config.repeat_interval,
            retention_period: config.retention_period,
            from: config.email.from.clone(),
            to: config.email.to.clone(),
            subject: config.email.subject.clone(),
        }
    }
}

/// Running delivery loop.
struct Lifecycle {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// State shared between the engine handle and its delivery loop.
struct EngineState {
    settings: NotifierSettings,
    sender: Arc<dyn MailSender>,
    /// Site hostname → alert state.
    sites: Mutex<HashMap<String, SiteNotification>>,
}

/// In-memory notification engine.
pub struct NotificationEngine {
    state: Arc<EngineState>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl NotificationEngine {
    pub fn new(settings: NotifierSettings, sender: Arc<dyn MailSender>) -> Self {
        Self {
            state: Arc::new(EngineState {
                settings,
                sender,
                sites: Mutex::new(HashMap::new()),
            }),
            lifecycle: Mutex::new(None),
        }
    }

    /// Run one delivery cycle now.
    ///
    /// Returns the number of sites included in the sent mail, zero when
    /// nothing was due.
    pub async fn deliver_due(&self) -> NotifyResult<usize> {
        self.state.deliver(&CancellationToken::new()).await
    }

    /// Snapshot of the alert state for `site`.
    pub fn site(&self, site: &str) -> Option<SiteNotification> {
        self.state.sites().get(site).cloned()
    }

    /// Number of sites currently tracked.
    pub fn tracked_sites(&self) -> usize {
        self.state.sites().len()
    }

    /// Whether the delivery loop is running.
    pub fn is_running(&self) -> bool {
        lock(&self.lifecycle).is_some()
    }
}

#[async_trait]
impl Notifier for NotificationEngine {
    fn start(&self) -> NotifyResult<()> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.is_some() {
            return Err(NotifyError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ticks = spawn_ticker(
            "notifier",
            self.state.settings.send_interval,
            cancel.clone(),
            &tracker,
        );
        tracker.spawn(run_delivery_loop(
            Arc::clone(&self.state),
            ticks,
            cancel.clone(),
        ));
        tracker.close();

        *lifecycle = Some(Lifecycle { cancel, tracker });
        info!(
            interval = ?self.state.settings.send_interval,
            repeat = ?self.state.settings.repeat_interval,
            "notifier started"
        );
        Ok(())
    }

    fn success(&self, site: &str, message: String) {
        if self.state.report(site, SiteStatus::Success, message) {
            info!(%site, "site closed");
        }
    }

    fn fail(&self, site: &str, message: String) {
        if self.state.report(site, SiteStatus::Fail, message) {
            info!(%site, "site returned unexpected response");
        }
    }

    async fn stop(&self, timeout: Duration) -> NotifyResult<()> {
        let Some(lifecycle) = lock(&self.lifecycle).take() else {
            return Ok(());
        };

        lifecycle.cancel.cancel();
        lifecycle.tracker.close();
        tokio::time::timeout(timeout, lifecycle.tracker.wait())
            .await
            .map_err(|_| NotifyError::ShutdownTimeout(timeout))?;

        info!("notifier stopped");
        Ok(())
    }
}

impl EngineState {
    fn sites(&self) -> MutexGuard<'_, HashMap<String, SiteNotification>> {
        lock(&self.sites)
    }

    fn report(&self, site: &str, status: SiteStatus, message: String) -> bool {
        let now = SystemTime::now();
        let mut sites = self.sites();
        sites
            .entry(site.to_string())
            .or_insert_with(|| SiteNotification::new(now))
            .record(status, message, now)
    }

    /// Drop stale entries and return `(site, message)` for everything due.
    fn collect_due(&self, now: SystemTime) -> Vec<(String, String)> {
        let retention = self.settings.retention_period;
        let repeat = self.settings.repeat_interval;
        let mut sites = self.sites();

        sites.retain(|site, info| {
            let stale = info.is_stale(now, retention);
            if stale {
                debug!(%site, "dropping stale site record");
            }
            !stale
        });

        let mut due: Vec<(String, String)> = sites
            .iter()
            .filter(|(_, info)| info.can_send(now, repeat))
            .map(|(site, info)| (site.clone(), info.message.clone()))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0));
        due
    }

    fn mark_sent(&self, batch: &[(String, String)], now: SystemTime) {
        let mut sites = self.sites();
        for (site, _) in batch {
            match sites.get_mut(site) {
                Some(info) => {
                    info.need_notify = false;
                    info.last_sent = now;
                    info.last_updated = now;
                }
                None => warn!(%site, "sent notification for an untracked site"),
            }
        }
    }

    async fn deliver(&self, cancel: &CancellationToken) -> NotifyResult<usize> {
        let batch = self.collect_due(SystemTime::now());
        if batch.is_empty() {
            return Ok(0);
        }

        let mail = Mail {
            from: self.settings.from.clone(),
            to: self.settings.to.clone(),
            subject: self.settings.subject.clone(),
            body: render_batch(&batch),
        };

        let timeout = self.settings.send_timeout;
        let sent = tokio::select! {
            _ = cancel.cancelled() => return Err(NotifyError::Cancelled),
            sent = tokio::time::timeout(timeout, self.sender.send(&mail)) => sent,
        };

        match sent {
            Ok(Ok(())) => {
                self.mark_sent(&batch, SystemTime::now());
                Ok(batch.len())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(MailError::Timeout(timeout).into()),
        }
    }
}

async fn run_delivery_loop(
    state: Arc<EngineState>,
    mut ticks: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    debug!("delivery loop starting");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
                match state.deliver(&cancel).await {
                    Ok(0) => {}
                    Ok(sites) => info!(sites, "notification sent"),
                    Err(NotifyError::Cancelled) => break,
                    Err(e) => error!(error = %e, "notification send failed"),
                }
            }
        }
    }

    debug!("delivery loop stopped");
}

fn render_batch(batch: &[(String, String)]) -> String {
    let mut body = String::new();
    for (_, message) in batch {
        body.push_str(message);
        body.push_str(MESSAGE_SEPARATOR);
    }
    body
}

fn elapsed(now: SystemTime, since: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or_default()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
