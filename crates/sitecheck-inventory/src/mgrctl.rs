//! ISPmanager inventory backed by the `mgrctl` CLI.
//!
//! `mgrctl -m ispmgr webdomain` prints one `key=value` line per web
//! domain. Each matched line becomes a `ManagedSite`; its probe targets
//! are the domain itself plus every directory under the owner's web root
//! named `<sub>.<domain>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use sitecheck_core::ManagedSite;

use crate::InventorySource;
use crate::error::{InventoryError, InventoryResult};

const WEBDOMAIN_PATTERN: &str = r"id=(?P<id>\d+)\s+name=(?P<name>[\w\.\-]+)\s+owner=(?P<owner>\w+)\s+docroot=(?P<docroot>[\w/\.\-]+)\s+(?:secure=(?P<secure>\w+)\s+)?php=(?P<php>.*?)\s+php_mode=(?P<php_mode>\w+)\s+php_version=(?P<php_version>[\d\.]+ \([^)]+\))\s+handler=(?P<handler>.*?)\s+active=(?P<active>\w+)\s+analyzer=(?P<analyzer>\w+)\s+ipaddr=(?P<ipaddr>[\d\.]+)\s+webscript_status=(?P<webscript_status>\w*)\s+database=(?P<database>[\w_\.\-]+)\s+(?P<ssl_status>[\w_]+)=?";

static WEBDOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(WEBDOMAIN_PATTERN).expect("webdomain pattern is valid"));

const HTTP_PORT: u16 = 80;
const HTTPS_PORT: u16 = 443;

/// Inventory source that shells out to ISPmanager's `mgrctl`.
#[derive(Debug, Clone)]
pub struct MgrctlInventory {
    mgrctl_path: PathBuf,
    /// Root holding `<owner>/data/www/<site>` directories.
    www_root: PathBuf,
}

impl MgrctlInventory {
    pub fn new(mgrctl_path: impl Into<PathBuf>, www_root: impl Into<PathBuf>) -> Self {
        Self {
            mgrctl_path: mgrctl_path.into(),
            www_root: www_root.into(),
        }
    }

    async fn run_mgrctl(&self) -> InventoryResult<String> {
        let output = tokio::process::Command::new(&self.mgrctl_path)
            .args(["-m", "ispmgr", "webdomain"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| InventoryError::Spawn {
                path: self.mgrctl_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(InventoryError::CommandFailed {
                path: self.mgrctl_path.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fill in `sites` for every domain. A web root that cannot be listed
    /// only affects its own domain, which is then probed by name alone.
    async fn attach_sites(&self, mut domains: Vec<ManagedSite>) -> Vec<ManagedSite> {
        for domain in &mut domains {
            match discover_sites(&self.www_root, &domain.owner, &domain.name).await {
                Ok(sites) => domain.sites = sites,
                Err(e) => {
                    warn!(
                        domain = %domain.name,
                        owner = %domain.owner,
                        error = %e,
                        "failed to list web root, probing domain only"
                    );
                    domain.sites = vec![domain.name.clone()];
                }
            }
        }
        domains
    }
}

#[async_trait]
impl InventorySource for MgrctlInventory {
    async fn fetch_managed_sites(&self) -> InventoryResult<Vec<ManagedSite>> {
        let output = self.run_mgrctl().await?;
        let domains = self.attach_sites(parse_webdomains(&output)).await;

        debug!(count = domains.len(), "fetched web domains");
        Ok(domains)
    }
}

/// Parse `mgrctl -m ispmgr webdomain` output.
///
/// Lines that do not match, or whose id is not a number, are skipped.
/// Returned domains carry only their own name in `sites`.
pub fn parse_webdomains(output: &str) -> Vec<ManagedSite> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<ManagedSite> {
    let Some(caps) = WEBDOMAIN_RE.captures(line) else {
        warn!(%line, "line does not match webdomain pattern");
        return None;
    };

    let id = match caps["id"].parse::<u64>() {
        Ok(id) => id,
        Err(e) => {
            warn!(%line, error = %e, "failed to parse domain id");
            return None;
        }
    };

    let port = if caps["ssl_status"].eq_ignore_ascii_case("ssl_not_used") {
        HTTP_PORT
    } else {
        HTTPS_PORT
    };
    let name = caps["name"].to_string();

    Some(ManagedSite {
        id,
        owner: caps["owner"].to_string(),
        docroot: caps["docroot"].to_string(),
        active: &caps["active"] == "on",
        address: caps["ipaddr"].to_string(),
        port,
        sites: vec![name.clone()],
        name,
    })
}

/// List the hostnames served for `domain` under the owner's web root.
///
/// The domain itself always comes first, followed by every directory whose
/// name ends in `.<domain>`, sorted by name. A missing web root is not an
/// error.
pub async fn discover_sites(
    www_root: &Path,
    owner: &str,
    domain: &str,
) -> InventoryResult<Vec<String>> {
    let dir = www_root.join(owner).join("data").join("www");
    let mut sites = vec![domain.to_string()];

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(sites),
        Err(source) => return Err(InventoryError::ReadDir { path: dir, source }),
    };

    let suffix = format!(".{domain}");
    let mut found = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => return Err(InventoryError::ReadDir { path: dir, source }),
        };

        let is_dir = entry
            .file_type()
            .await
            .map_err(|source| InventoryError::ReadDir {
                path: entry.path(),
                source,
            })?
            .is_dir();
        if !is_dir {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.len() > suffix.len() && name.ends_with(&suffix) {
            found.push(name);
        }
    }

    found.sort();
    sites.extend(found);
    Ok(sites)
}
