//! proximo-rs: per-hostname reverse proxy with a local mirror
//!
//! Each hostname has a docroot holding a partial local copy of a site.
//! Requests are answered from the docroot when a matching file exists and
//! forwarded to the remote origin otherwise; redirects from the origin are
//! rewritten so clients keep seeing the hostname they asked for.
//!
//! # Features
//!
//! - Hostname aliases
//! - Per-path remote overrides with `*` wildcard patterns
//! - `always_from_remote` patterns that bypass the local mirror
//! - Automatic `index.html` for directory paths with a local index
//! - Host settings re-read on every request (no restart needed)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:80"
//!
//! [[hosts]]
//! hostname = "example.com"
//! docroot = "/var/www/example"
//! aliases = ["www.example.com"]
//! always_from_remote = ["/cgi-bin/*"]
//!
//! [hosts.proxy]
//! default = "origin.example.com"
//! others = [{ for = "/images/*", use = "images.example.com" }]
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod local;
pub mod pattern;
pub mod proxy;
pub mod resolver;

pub use config::{ConfigStore, FileConfigStore, HostConfig, ProxyConfig, ProxyRule, StaticConfigStore};
pub use dispatch::{decide, Dispatch};
pub use error::{ProxyError, Result};
pub use proxy::ProxyServer;
pub use resolver::resolve;
