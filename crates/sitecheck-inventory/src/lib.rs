//! sitecheck-inventory — where the list of sites to probe comes from.
//!
//! The checker only depends on the [`InventorySource`] trait; the
//! production implementation asks ISPmanager for its web domains and
//! walks each owner's web root for virtual hosts.
//!
//! # Architecture
//!
//! ```text
//! MgrctlInventory
//!   ├── mgrctl -m ispmgr webdomain  → parse_webdomains()
//!   └── /var/www/<owner>/data/www/  → discover_sites()
//! ```

pub mod error;
pub mod mgrctl;

use async_trait::async_trait;

use sitecheck_core::ManagedSite;

pub use error::{InventoryError, InventoryResult};
pub use mgrctl::{MgrctlInventory, discover_sites, parse_webdomains};

/// Snapshot provider for the managed site list.
///
/// Called once per scheduling tick; implementations must not cache.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_managed_sites(&self) -> InventoryResult<Vec<ManagedSite>>;
}
