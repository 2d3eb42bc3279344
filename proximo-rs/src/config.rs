//! Configuration for proximo-rs
//!
//! The `[server]` section is read once at startup. The `[[hosts]]` table is
//! read again for every request through a [`ConfigStore`], so edits to the
//! file take effect without a restart.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, Result};
use crate::pattern::Pattern;

/// Main proxy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Per-hostname settings, in declaration order
    #[serde(default)]
    pub hosts: Vec<HostSettings>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:80")
    pub listen_addr: String,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Largest request body accepted for forwarding
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Settings for one hostname, as written in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostSettings {
    /// Primary hostname (e.g., "foo.com")
    pub hostname: String,
    /// Local mirror root
    #[serde(default)]
    pub docroot: String,
    /// Remote origin(s); absent means everything is served locally
    pub proxy: Option<ProxySetting>,
    /// Paths that are always fetched from the remote host
    #[serde(default)]
    pub always_from_remote: Vec<String>,
    /// Other hostnames sharing these settings
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// The two accepted shapes of the `proxy` key
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProxySetting {
    /// `proxy = "origin.foo.com"`
    Host(String),
    /// `[hosts.proxy]` with `default` and ordered `others`
    Routed {
        default: String,
        #[serde(default)]
        others: Vec<OverrideSetting>,
    },
}

/// One `{ for = pattern, use = host }` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverrideSetting {
    #[serde(rename = "for")]
    pub pattern: String,
    #[serde(rename = "use")]
    pub host: String,
}

/// Resolved proxy rule for a host
#[derive(Debug, Clone)]
pub enum ProxyRule {
    /// No remote host; always serve locally
    None,
    /// Every path goes to this remote host
    Single(String),
    /// First matching override wins, else the default
    Routed {
        default: String,
        overrides: Vec<(Pattern, String)>,
    },
}

impl ProxyRule {
    /// Remote host for a path, if any
    pub fn remote_target(&self, path: &str) -> Option<&str> {
        match self {
            ProxyRule::None => None,
            ProxyRule::Single(host) => Some(host.as_str()),
            ProxyRule::Routed { default, overrides } => Some(
                overrides
                    .iter()
                    .find(|(pattern, _)| pattern.matches(path))
                    .map(|(_, host)| host.as_str())
                    .unwrap_or(default.as_str()),
            ),
        }
    }
}

/// Compiled settings for one hostname
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Primary hostname
    pub hostname: String,
    /// Local mirror root
    pub docroot: PathBuf,
    /// Remote routing rule
    pub proxy_rule: ProxyRule,
    /// Paths always fetched remotely
    pub always_from_remote: Vec<Pattern>,
    /// Alternate hostnames
    pub aliases: Vec<String>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn validate_remote_host(host: &str) -> Result<String> {
    let parsed = url::Url::parse(&format!("http://{}", host)).map_err(|e| {
        ProxyError::Config(format!("Invalid remote host '{}': {}", host, e))
    })?;

    if parsed.host_str().is_none() || parsed.path() != "/" {
        return Err(ProxyError::Config(format!(
            "Invalid remote host '{}': expected host[:port]",
            host
        )));
    }

    Ok(host.to_string())
}

impl HostSettings {
    /// Whether `hostname` is this entry's primary name
    pub fn is_named(&self, hostname: &str) -> bool {
        self.hostname == hostname
    }

    /// Whether `hostname` is one of this entry's aliases
    pub fn has_alias(&self, hostname: &str) -> bool {
        self.aliases.iter().any(|alias| alias == hostname)
    }

    /// Compile patterns and the proxy rule
    pub fn compile(&self) -> Result<HostConfig> {
        let proxy_rule = match &self.proxy {
            None => ProxyRule::None,
            Some(ProxySetting::Host(host)) => ProxyRule::Single(validate_remote_host(host)?),
            Some(ProxySetting::Routed { default, others }) => {
                let overrides = others
                    .iter()
                    .map(|o| Ok((Pattern::compile(&o.pattern)?, validate_remote_host(&o.host)?)))
                    .collect::<Result<Vec<_>>>()?;
                ProxyRule::Routed {
                    default: validate_remote_host(default)?,
                    overrides,
                }
            }
        };

        let always_from_remote = self
            .always_from_remote
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(HostConfig {
            hostname: self.hostname.clone(),
            docroot: PathBuf::from(&self.docroot),
            proxy_rule,
            always_from_remote,
            aliases: self.aliases.clone(),
        })
    }
}

impl ProxyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ProxyError::Config("No hosts configured".to_string()));
        }

        for host in &self.hosts {
            host.compile()?;
        }

        Ok(())
    }
}

/// Source of host settings, consulted once per request
pub trait ConfigStore: Send + Sync {
    /// All host entries, in declaration order
    fn hosts(&self) -> Result<Vec<HostSettings>>;
}

/// Re-reads the config file on every lookup
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for FileConfigStore {
    fn hosts(&self) -> Result<Vec<HostSettings>> {
        Ok(ProxyConfig::from_file(&self.path)?.hosts)
    }
}

/// Fixed host list held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    hosts: Vec<HostSettings>,
}

impl StaticConfigStore {
    pub fn new(hosts: Vec<HostSettings>) -> Self {
        Self { hosts }
    }
}

impl ConfigStore for StaticConfigStore {
    fn hosts(&self) -> Result<Vec<HostSettings>> {
        Ok(self.hosts.clone())
    }
}
