//! Domain types shared across sitecheck crates.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};

/// One backend managed by the hosting control plane.
///
/// Returned as a snapshot by the inventory source and re-fetched on every
/// scheduling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSite {
    pub id: u64,
    pub owner: String,
    pub name: String,
    pub docroot: String,
    pub active: bool,
    /// Backend address every site of this domain is dialed at.
    pub address: String,
    pub port: u16,
    /// Hostnames to probe, the domain name itself first.
    pub sites: Vec<String>,
}

/// Fixed backend a probe dials, independent of the hostname it presents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// Outcome of a single probe, written by the worker that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: Option<u16>,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            status: None,
            error: None,
            timestamp: Local::now(),
        }
    }
}

/// One probe work item for a single hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub domain_id: u64,
    pub owner: String,
    pub domain_name: String,
    pub site: String,
    pub connection: Connection,
    pub result: ProbeResult,
}

impl Task {
    /// Build a pending task for `site` under the given domain.
    pub fn for_site(domain: &ManagedSite, site: &str) -> Self {
        Self {
            domain_id: domain.id,
            owner: domain.owner.clone(),
            domain_name: domain.name.clone(),
            site: site.to_string(),
            connection: Connection {
                address: domain.address.clone(),
                port: domain.port,
            },
            result: ProbeResult::default(),
        }
    }
}

/// Decides whether a domain's sites are probed at all.
pub type SiteFilter = Arc<dyn Fn(&ManagedSite) -> bool + Send + Sync>;

/// Filter that keeps only domains marked active by the control plane.
pub fn active_only() -> SiteFilter {
    Arc::new(|site: &ManagedSite| site.active)
}

/// Filter that keeps every domain.
pub fn all_sites() -> SiteFilter {
    Arc::new(|_: &ManagedSite| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(active: bool) -> ManagedSite {
        ManagedSite {
            id: 7,
            owner: "www-user".to_string(),
            name: "example.com".to_string(),
            docroot: "/var/www/www-user/data/www/example.com".to_string(),
            active,
            address: "10.0.0.5".to_string(),
            port: 80,
            sites: vec!["example.com".to_string(), "shop.example.com".to_string()],
        }
    }

    #[test]
    fn task_copies_domain_fields() {
        let task = Task::for_site(&domain(true), "shop.example.com");
        assert_eq!(task.domain_id, 7);
        assert_eq!(task.owner, "www-user");
        assert_eq!(task.domain_name, "example.com");
        assert_eq!(task.site, "shop.example.com");
        assert_eq!(task.connection.to_string(), "10.0.0.5:80");
        assert!(task.result.status.is_none());
        assert!(task.result.error.is_none());
    }

    #[test]
    fn connection_brackets_ipv6() {
        let conn = Connection {
            address: "::1".to_string(),
            port: 8080,
        };
        assert_eq!(conn.to_string(), "[::1]:8080");
    }

    #[test]
    fn filters() {
        assert!(active_only()(&domain(true)));
        assert!(!active_only()(&domain(false)));
        assert!(all_sites()(&domain(false)));
    }
}
