//! Probe workers.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sitecheck_core::{ProbeResult, Task};

use crate::error::ProbeError;
use crate::prober::Probe;
use crate::queue::TaskQueue;

/// Take tasks off `queue`, probe them and forward the filled-in task to
/// `results`.
///
/// Returns when `cancel` fires, the queue closes, or the result channel
/// is gone. A task whose probe was cancelled is dropped.
pub async fn run_worker(
    id: usize,
    queue: TaskQueue,
    prober: Arc<dyn Probe>,
    results: mpsc::Sender<Task>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "worker starting");

    loop {
        let mut task = tokio::select! {
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        let outcome = prober.probe(&task.connection, &task.site, &cancel).await;
        task.result = match outcome {
            Ok(status) => ProbeResult {
                status: Some(status),
                error: None,
                timestamp: Local::now(),
            },
            Err(ProbeError::Cancelled) => break,
            Err(e) => ProbeResult {
                status: None,
                error: Some(e.to_string()),
                timestamp: Local::now(),
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = results.send(task) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sitecheck_core::{Connection, ManagedSite};
    use std::time::Duration;

    struct FixedProbe(Result<u16, &'static str>);

    #[async_trait]
    impl Probe for FixedProbe {
        async fn probe(
            &self,
            _connection: &Connection,
            _site: &str,
            _cancel: &CancellationToken,
        ) -> Result<u16, ProbeError> {
            self.0.map_err(|msg| ProbeError::Connect {
                address: "127.0.0.1:80".to_string(),
                source: std::io::Error::other(msg),
            })
        }
    }

    /// Blocks until cancelled.
    struct HangingProbe;

    #[async_trait]
    impl Probe for HangingProbe {
        async fn probe(
            &self,
            _connection: &Connection,
            _site: &str,
            cancel: &CancellationToken,
        ) -> Result<u16, ProbeError> {
            cancel.cancelled().await;
            Err(ProbeError::Cancelled)
        }
    }

    fn task(site: &str) -> Task {
        let domain = ManagedSite {
            id: 3,
            owner: "owner".to_string(),
            name: "example.com".to_string(),
            docroot: String::new(),
            active: true,
            address: "127.0.0.1".to_string(),
            port: 80,
            sites: vec![site.to_string()],
        };
        Task::for_site(&domain, site)
    }

    #[tokio::test]
    async fn forwards_status_code() {
        let (tx, queue) = TaskQueue::bounded(1);
        let (results_tx, mut results) = mpsc::channel(1);
        let worker = tokio::spawn(run_worker(
            0,
            queue,
            Arc::new(FixedProbe(Ok(401))),
            results_tx,
            CancellationToken::new(),
        ));

        tx.send(task("example.com")).await.unwrap();
        let done = results.recv().await.unwrap();
        assert_eq!(done.site, "example.com");
        assert_eq!(done.result.status, Some(401));
        assert!(done.result.error.is_none());

        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn forwards_probe_error_text() {
        let (tx, queue) = TaskQueue::bounded(1);
        let (results_tx, mut results) = mpsc::channel(1);
        tokio::spawn(run_worker(
            0,
            queue,
            Arc::new(FixedProbe(Err("connection refused"))),
            results_tx,
            CancellationToken::new(),
        ));

        tx.send(task("example.com")).await.unwrap();
        let done = results.recv().await.unwrap();
        assert!(done.result.status.is_none());
        assert!(
            done.result
                .error
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn cancelled_probe_is_not_forwarded() {
        let (tx, queue) = TaskQueue::bounded(1);
        let (results_tx, mut results) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            0,
            queue,
            Arc::new(HangingProbe),
            results_tx,
            cancel.clone(),
        ));

        tx.send(task("example.com")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert!(results.recv().await.is_none());
    }
}
