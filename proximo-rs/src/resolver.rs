//! Hostname to host configuration resolution
//!
//! Looks the hostname up directly, then among aliases in declaration order,
//! and checks the docroot against the live filesystem every time.

use tracing::debug;

use crate::config::{ConfigStore, HostConfig};
use crate::error::{ProxyError, Result};

/// Resolve the configuration for `hostname`
pub fn resolve(hostname: &str, store: &dyn ConfigStore) -> Result<HostConfig> {
    let hosts = store.hosts()?;

    let settings = hosts
        .iter()
        .find(|h| h.is_named(hostname))
        .or_else(|| hosts.iter().find(|h| h.has_alias(hostname)))
        .ok_or_else(|| ProxyError::ConfigNotFound(hostname.to_string()))?;

    if settings.hostname != hostname {
        debug!("Hostname {} is an alias of {}", hostname, settings.hostname);
    }

    if settings.docroot.is_empty() || !std::path::Path::new(&settings.docroot).exists() {
        return Err(ProxyError::InvalidDocroot {
            hostname: hostname.to_string(),
            docroot: settings.docroot.clone(),
        });
    }

    settings.compile()
}
