//! Checker — wires the scheduling pipeline together and owns its lifecycle.
//!
//! ```text
//! ticker → Scheduler → TaskQueue → N × worker → classifier → Notifier
//! ```
//!
//! Every stage runs on one `TaskTracker` and watches one shared
//! cancellation token. The notifier keeps its own delivery loop and is
//! started and stopped together with the pipeline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use sitecheck_core::{Config, SiteFilter, spawn_ticker};
use sitecheck_inventory::InventorySource;
use sitecheck_notify::Notifier;

use crate::classifier::run_classifier;
use crate::error::{CheckerError, CheckerResult};
use crate::prober::Probe;
use crate::queue::TaskQueue;
use crate::scheduler::Scheduler;
use crate::worker::run_worker;

/// Pending tasks the scheduler may queue ahead of the workers.
const TASK_QUEUE_CAPACITY: usize = 1;

/// Pipeline tuning taken from configuration.
#[derive(Clone)]
pub struct CheckerSettings {
    pub scrape_interval: Duration,
    pub workers: usize,
    /// Status code of a properly closed site.
    pub expected_status: u16,
    pub filter: SiteFilter,
}

impl CheckerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scrape_interval: config.scrape_interval,
            workers: config.workers,
            expected_status: config.expected_status,
            filter: config.site_filter(),
        }
    }
}

struct Running {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

pub struct Checker {
    settings: CheckerSettings,
    inventory: Arc<dyn InventorySource>,
    prober: Arc<dyn Probe>,
    notifier: Arc<dyn Notifier>,
    running: Mutex<Option<Running>>,
}

impl Checker {
    pub fn new(
        settings: CheckerSettings,
        inventory: Arc<dyn InventorySource>,
        prober: Arc<dyn Probe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            inventory,
            prober,
            notifier,
            running: Mutex::new(None),
        }
    }

    /// Start the pipeline with a ticker firing every `scrape_interval`.
    pub fn start(&self) -> CheckerResult<()> {
        self.launch(None)
    }

    /// Start the pipeline driven by externally supplied triggers instead
    /// of the built-in ticker.
    pub fn start_with_triggers(&self, triggers: mpsc::Receiver<()>) -> CheckerResult<()> {
        self.launch(Some(triggers))
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    fn launch(&self, triggers: Option<mpsc::Receiver<()>>) -> CheckerResult<()> {
        let mut running = self.running();
        if running.is_some() {
            return Err(CheckerError::AlreadyRunning);
        }

        self.notifier.start()?;

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let triggers = match triggers {
            Some(triggers) => triggers,
            None => spawn_ticker(
                "scheduler",
                self.settings.scrape_interval,
                cancel.clone(),
                &tracker,
            ),
        };

        let (task_tx, queue) = TaskQueue::bounded(TASK_QUEUE_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(self.settings.workers.max(1));

        let scheduler = Scheduler::new(
            Arc::clone(&self.inventory),
            Arc::clone(&self.settings.filter),
            task_tx,
        );
        tracker.spawn(scheduler.run(triggers, cancel.clone()));

        for id in 0..self.settings.workers {
            tracker.spawn(run_worker(
                id,
                queue.clone(),
                Arc::clone(&self.prober),
                result_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(result_tx);

        tracker.spawn(run_classifier(
            result_rx,
            Arc::clone(&self.notifier),
            self.settings.expected_status,
            cancel.clone(),
        ));
        tracker.close();

        *running = Some(Running { cancel, tracker });
        info!(
            workers = self.settings.workers,
            interval = ?self.settings.scrape_interval,
            expected_status = self.settings.expected_status,
            "checker started"
        );
        Ok(())
    }

    /// Stop the pipeline and the notifier, waiting at most `timeout` for
    /// every task to finish.
    ///
    /// Probes still in flight are abandoned. A checker that is not
    /// running stops immediately.
    pub async fn stop(&self, timeout: Duration) -> CheckerResult<()> {
        let Some(running) = self.running().take() else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;

        running.cancel.cancel();

        let remaining = deadline.saturating_duration_since(Instant::now());
        let notifier_stopped = self.notifier.stop(remaining).await;
        if let Err(e) = &notifier_stopped {
            warn!(error = %e, "notifier did not stop cleanly");
        }

        if tokio::time::timeout_at(deadline, running.tracker.wait())
            .await
            .is_err()
        {
            return Err(CheckerError::ShutdownTimeout(timeout));
        }

        notifier_stopped?;
        info!("checker stopped");
        Ok(())
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
