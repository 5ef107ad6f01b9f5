//! Turns scheduling ticks into probe tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use sitecheck_core::{SiteFilter, Task};
use sitecheck_inventory::InventorySource;

use crate::queue::TaskSender;

pub struct Scheduler {
    inventory: Arc<dyn InventorySource>,
    filter: SiteFilter,
    tasks: TaskSender,
}

impl Scheduler {
    pub fn new(inventory: Arc<dyn InventorySource>, filter: SiteFilter, tasks: TaskSender) -> Self {
        Self {
            inventory,
            filter,
            tasks,
        }
    }

    /// Run one cycle per received trigger until `cancel` fires or the
    /// trigger channel closes. Dropping the scheduler closes the task
    /// queue.
    pub async fn run(self, mut triggers: mpsc::Receiver<()>, cancel: CancellationToken) {
        debug!("scheduler starting");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    if self.dispatch(&cancel).await.is_none() {
                        break;
                    }
                }
            }
        }

        debug!("scheduler stopped");
    }

    /// Fetch the inventory and queue one task per accepted site.
    ///
    /// Returns the number of queued tasks, or `None` when the cycle was
    /// interrupted by cancellation or a closed queue.
    pub async fn dispatch(&self, cancel: &CancellationToken) -> Option<usize> {
        let domains = match self.inventory.fetch_managed_sites().await {
            Ok(domains) => domains,
            Err(e) => {
                error!(error = %e, "failed to fetch managed sites, skipping cycle");
                return Some(0);
            }
        };

        let mut queued = 0;
        for domain in &domains {
            if !(self.filter)(domain) {
                debug!(domain = %domain.name, owner = %domain.owner, "domain skipped by filter");
                continue;
            }

            for site in &domain.sites {
                let task = Task::for_site(domain, site);
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    sent = self.tasks.send(task) => {
                        if sent.is_err() {
                            return None;
                        }
                    }
                }
                queued += 1;
            }
        }

        info!(domains = domains.len(), tasks = queued, "check cycle dispatched");
        Some(queued)
    }
}
