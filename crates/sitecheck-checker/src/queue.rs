//! Bounded multi-consumer task queue between the scheduler and workers.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use sitecheck_core::Task;

/// Producer half, owned by the scheduler.
pub type TaskSender = mpsc::Sender<Task>;

/// Consumer half shared by every worker.
///
/// Cloning hands out another handle to the same queue; each task is
/// received by exactly one worker.
#[derive(Clone)]
pub struct TaskQueue {
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` pending tasks.
    pub fn bounded(capacity: usize) -> (TaskSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            rx: Arc::new(Mutex::new(rx)),
        };
        (tx, queue)
    }

    /// Next task, or `None` once every sender is gone and the queue is
    /// drained.
    pub async fn recv(&self) -> Option<Task> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecheck_core::ManagedSite;
    use std::time::Duration;

    fn task(site: &str) -> Task {
        let domain = ManagedSite {
            id: 1,
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
    async fn each_task_goes_to_one_consumer() {
        let (tx, queue) = TaskQueue::bounded(4);
        let other = queue.clone();

        tx.send(task("a")).await.unwrap();
        tx.send(task("b")).await.unwrap();
        drop(tx);

        let first = queue.recv().await.unwrap();
        let second = other.recv().await.unwrap();
        assert_eq!(first.site, "a");
        assert_eq!(second.site, "b");
        assert!(queue.recv().await.is_none());
        assert!(other.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (tx, queue) = TaskQueue::bounded(1);
        tx.send(task("a")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(task("b"))).await;
        assert!(blocked.is_err());

        assert_eq!(queue.recv().await.unwrap().site, "a");
        tx.send(task("b")).await.unwrap();
        assert_eq!(queue.recv().await.unwrap().site, "b");
    }
}
