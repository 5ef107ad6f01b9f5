//! Probe result classification.
//!
//! A site is considered properly closed when it answers with the expected
//! status code (401 by default). Every other answer, including transport
//! errors, is reported as a problem.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sitecheck_core::Task;
use sitecheck_notify::Notifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Site answered with the expected code. Carries the notification text.
    Closed(String),
    /// Site is reachable without authorization or could not be probed.
    Problem(String),
}

/// Classify a finished task against `expected_status`.
pub fn classify(task: &Task, expected_status: u16) -> Verdict {
    let result = &task.result;

    if result.error.is_none() && result.status == Some(expected_status) {
        return Verdict::Closed(format!(
            "Site {} is closed - {}\r\nOwner - {}",
            task.site, expected_status, task.owner
        ));
    }

    let mut msg = String::from("Site check found a problem\n");
    let _ = writeln!(msg, "Site: {}", task.site);
    let _ = writeln!(msg, "Owner: {}", task.owner);
    let _ = writeln!(msg, "Time: {}", result.timestamp.format("%Y-%m-%d %H:%M:%S %:z"));
    match (&result.error, result.status) {
        (Some(error), _) => {
            let _ = write!(msg, "Error: {error}");
        }
        (None, Some(status)) => {
            let _ = write!(msg, "Status code: {status}");
        }
        (None, None) => msg.push_str("Error: no response"),
    }

    Verdict::Problem(msg)
}

/// Feed every finished task to `notifier` until `cancel` fires or the
/// result channel closes.
pub async fn run_classifier(
    mut results: mpsc::Receiver<Task>,
    notifier: Arc<dyn Notifier>,
    expected_status: u16,
    cancel: CancellationToken,
) {
    debug!("classifier starting");

    loop {
        let task = tokio::select! {
            _ = cancel.cancelled() => break,
            task = results.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        match classify(&task, expected_status) {
            Verdict::Closed(message) => {
                debug!(site = %task.site, owner = %task.owner, "site closed");
                notifier.success(&task.site, message);
            }
            Verdict::Problem(message) => {
                debug!(
                    site = %task.site,
                    owner = %task.owner,
                    status = ?task.result.status,
                    error = ?task.result.error,
                    "site problem"
                );
                notifier.fail(&task.site, message);
            }
        }
    }

    debug!("classifier stopped");
}
