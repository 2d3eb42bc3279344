//! Local-vs-remote dispatch
//!
//! Decides, per request, whether the local mirror answers or the request
//! goes to a remote host. Order matters: index canonicalization runs first
//! because it changes the path every later rule looks at.

use tracing::debug;

use crate::config::HostConfig;
use crate::context::RequestContext;
use crate::local::exists_locally;
use crate::pattern::matches_any;

const INDEX_FILE: &str = "index.html";

/// Outcome of dispatch, carrying the canonical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Serve from the docroot
    ServeLocal { path: String },
    /// Forward to a remote host
    ServeRemote { host: String, path: String },
}

impl Dispatch {
    /// Canonical path for either outcome
    pub fn path(&self) -> &str {
        match self {
            Dispatch::ServeLocal { path } | Dispatch::ServeRemote { path, .. } => path.as_str(),
        }
    }
}

/// Append `index.html` to directory paths that have a local index
pub fn canonical_path(raw_path: &str, config: &HostConfig) -> String {
    if raw_path.ends_with('/') {
        let index = format!("{}{}", raw_path, INDEX_FILE);
        if exists_locally(&config.docroot, &index) {
            return index;
        }
    }
    raw_path.to_string()
}

/// Whether a proxied host still answers `path` from the docroot
fn prefers_local(path: &str, config: &HostConfig) -> bool {
    // Trailing-slash paths go remote so the origin can render directory pages.
    !matches_any(path, Some(config.always_from_remote.as_slice()))
        && exists_locally(&config.docroot, path)
        && !path.ends_with('/')
}

/// Decide how to answer a request
pub fn decide(ctx: &RequestContext, config: &HostConfig) -> Dispatch {
    let path = canonical_path(&ctx.raw_path, config);
    let remote = config.proxy_rule.remote_target(&path);

    let dispatch = match remote {
        Some(host) if !prefers_local(&path, config) => Dispatch::ServeRemote {
            host: host.to_string(),
            path,
        },
        _ => Dispatch::ServeLocal { path },
    };

    debug!(
        "Dispatch {} {}{} -> {:?}",
        ctx.method.as_str(),
        ctx.hostname,
        ctx.raw_path,
        dispatch
    );

    dispatch
}
