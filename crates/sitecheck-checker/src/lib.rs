//! sitecheck-checker — periodic probing of every managed site.
//!
//! On each tick the [`Scheduler`] asks the inventory for the current site
//! list and queues one task per hostname. A fixed pool of workers probes
//! the backends over HTTP and the classifier turns each answer into a
//! `success` or `fail` event for the notifier.
//!
//! # Architecture
//!
//! ```text
//! Checker
//!   ├── ticker (scrape_interval)
//!   ├── Scheduler ── InventorySource
//!   ├── TaskQueue → worker × N ── Probe (HttpProber)
//!   └── classifier → Notifier
//! ```

pub mod checker;
pub mod classifier;
pub mod error;
pub mod prober;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use checker::{Checker, CheckerSettings};
pub use classifier::{Verdict, classify};
pub use error::{CheckerError, CheckerResult, ProbeError};
pub use prober::{HttpProber, Probe};
pub use queue::{TaskQueue, TaskSender};
pub use scheduler::Scheduler;
