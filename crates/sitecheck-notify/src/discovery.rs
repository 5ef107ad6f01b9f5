//! SMTP relay discovery from the sender address.
//!
//! Tries `smtp.<domain>` first and falls back to the domain's preferred
//! MX host.

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use tracing::{debug, info};

use crate::error::{MailError, MailResult};
use crate::mail::address_domain;

/// DNS lookups needed to find a relay.
#[async_trait]
pub trait RelayResolver: Send + Sync {
    /// Whether `host` resolves to at least one IP address.
    async fn has_address(&self, host: &str) -> MailResult<bool>;

    /// MX records of `domain` as `(preference, exchange)` pairs.
    async fn mail_exchangers(&self, domain: &str) -> MailResult<Vec<(u16, String)>>;
}

/// Resolver backed by the system DNS configuration.
pub struct DnsResolver {
    inner: TokioResolver,
}

impl DnsResolver {
    pub fn from_system_conf() -> MailResult<Self> {
        let inner = TokioResolver::builder_tokio()?.build();
        Ok(Self { inner })
    }
}

#[async_trait]
impl RelayResolver for DnsResolver {
    async fn has_address(&self, host: &str) -> MailResult<bool> {
        let ips = self.inner.lookup_ip(host).await?;
        Ok(ips.iter().next().is_some())
    }

    async fn mail_exchangers(&self, domain: &str) -> MailResult<Vec<(u16, String)>> {
        let records = self.inner.mx_lookup(domain).await?;
        Ok(records
            .iter()
            .map(|mx| (mx.preference(), mx.exchange().to_string()))
            .collect())
    }
}

/// Pick the SMTP relay for `from` when none is configured.
pub async fn discover_smtp_host(from: &str, resolver: &dyn RelayResolver) -> MailResult<String> {
    let domain = address_domain(from)?;
    let candidate = format!("smtp.{domain}");

    info!(host = %candidate, "looking up smtp subdomain");
    let found = match resolver.has_address(&candidate).await {
        Ok(found) => found,
        Err(e) => {
            debug!(host = %candidate, error = %e, "smtp subdomain lookup failed");
            false
        }
    };
    if found {
        return Ok(candidate);
    }

    info!(%domain, "smtp subdomain not found, looking up mx");
    let exchangers = resolver.mail_exchangers(&domain).await?;
    let host = exchangers
        .into_iter()
        .min_by_key(|(preference, _)| *preference)
        .map(|(_, host)| host.trim_end_matches('.').to_string())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MailError::Unavailable(format!("no mx record for {domain}")))?;

    info!(mx = %host, "found mx");
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers from fixed tables and records every query.
    #[derive(Default)]
    struct StaticResolver {
        addresses: Vec<&'static str>,
        mx: HashMap<&'static str, Vec<(u16, String)>>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelayResolver for StaticResolver {
        async fn has_address(&self, host: &str) -> MailResult<bool> {
            self.queries.lock().unwrap().push(format!("A {host}"));
            Ok(self.addresses.iter().any(|a| *a == host))
        }

        async fn mail_exchangers(&self, domain: &str) -> MailResult<Vec<(u16, String)>> {
            self.queries.lock().unwrap().push(format!("MX {domain}"));
            self.mx
                .get(domain)
                .cloned()
                .ok_or_else(|| MailError::Unavailable(format!("NXDOMAIN {domain}")))
        }
    }

    #[tokio::test]
    async fn prefers_smtp_subdomain() {
        let resolver = StaticResolver {
            addresses: vec!["smtp.example.com"],
            ..Default::default()
        };
        let host = discover_smtp_host("Monitor <monitor@example.com>", &resolver)
            .await
            .unwrap();
        assert_eq!(host, "smtp.example.com");
        assert_eq!(*resolver.queries.lock().unwrap(), vec!["A smtp.example.com"]);
    }

    #[tokio::test]
    async fn falls_back_to_preferred_mx() {
        let mut mx = HashMap::new();
        mx.insert(
            "example.com",
            vec![
                (20, "backup.mx.example.net.".to_string()),
                (10, "mx.example.net.".to_string()),
            ],
        );
        let resolver = StaticResolver {
            mx,
            ..Default::default()
        };

        let host = discover_smtp_host("monitor@example.com", &resolver)
            .await
            .unwrap();
        assert_eq!(host, "mx.example.net");
        assert_eq!(
            *resolver.queries.lock().unwrap(),
            vec!["A smtp.example.com", "MX example.com"]
        );
    }

    #[tokio::test]
    async fn missing_mx_is_an_error() {
        let resolver = StaticResolver::default();
        assert!(matches!(
            discover_smtp_host("monitor@example.com", &resolver).await,
            Err(MailError::Unavailable(_))
        ));

        let mut mx = HashMap::new();
        mx.insert("example.com", Vec::new());
        let resolver = StaticResolver {
            mx,
            ..Default::default()
        };
        assert!(matches!(
            discover_smtp_host("monitor@example.com", &resolver).await,
            Err(MailError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn rejects_bad_sender() {
        let resolver = StaticResolver::default();
        assert!(matches!(
            discover_smtp_host("not-an-address", &resolver).await,
            Err(MailError::Address { .. })
        ));
        assert!(resolver.queries.lock().unwrap().is_empty());
    }
}
