//! HTTP gateway server

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    response::IntoResponse,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ConfigStore, HostConfig, ServerConfig};
use crate::context::RequestContext;
use crate::dispatch::{decide, Dispatch};
use crate::error::{ProxyError, Result};
use crate::forward::Forwarder;
use crate::local::serve_local;
use crate::resolver::resolve;

/// Shared proxy state
pub struct ProxyState {
    /// Host settings, read once per request
    pub store: Arc<dyn ConfigStore>,
    /// Client for remote hosts
    pub forwarder: Forwarder,
    /// Largest POST body accepted
    pub max_body_bytes: usize,
}

/// Proxy server
pub struct ProxyServer {
    config: ServerConfig,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ServerConfig, store: Arc<dyn ConfigStore>) -> Self {
        let state = Arc::new(ProxyState {
            store,
            forwarder: Forwarder::new(Duration::from_secs(config.timeout_seconds)),
            max_body_bytes: config.max_body_bytes,
        });

        Self { config, state }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the proxy server
    pub async fn run(&self) -> Result<()> {
        let addr = &self.config.listen_addr;
        info!("Starting proxy server on {}", addr);

        match self.state.store.hosts() {
            Ok(hosts) => {
                info!("Configured hosts:");
                for host in &hosts {
                    info!("  {} (aliases: {:?}) -> {}", host.hostname, host.aliases, host.docroot);
                }
            }
            Err(e) => warn!("Host settings not readable yet: {}", e),
        }

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .await
            .map_err(|e| ProxyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        Ok(())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Read host settings and stat the docroot off the async workers
async fn resolve_and_decide(
    store: Arc<dyn ConfigStore>,
    ctx: Arc<RequestContext>,
) -> Result<(HostConfig, Dispatch)> {
    tokio::task::spawn_blocking(move || {
        let config = resolve(&ctx.hostname, store.as_ref())?;
        let dispatch = decide(&ctx, &config);
        Ok::<_, ProxyError>((config, dispatch))
    })
    .await
    .map_err(|e| ProxyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

/// Resolve, dispatch, then serve locally or forward
async fn handle(state: &ProxyState, req: Request<Body>) -> Result<Response<Body>> {
    let ctx = Arc::new(RequestContext::from_request(req, state.max_body_bytes).await?);
    let (config, dispatch) = resolve_and_decide(state.store.clone(), ctx.clone()).await?;

    match dispatch {
        Dispatch::ServeLocal { path } => Ok(serve_local(&config.docroot, &path).await),
        Dispatch::ServeRemote { host, path } => Ok(state
            .forwarder
            .forward(&host, &path, &ctx)
            .await?
            .into_response()),
    }
}

/// Main proxy handler
async fn proxy_handler(State(state): State<Arc<ProxyState>>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    match handle(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_client_error() {
                warn!("{} {} failed: {}", method, uri, e);
            } else {
                error!("{} {} failed: {}", method, uri, e);
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostSettings, StaticConfigStore};
    use crate::context::RequestMethod;

    fn test_config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            timeout_seconds: 30,
            max_body_bytes: 1024,
        }
    }

    #[test]
    fn test_proxy_server_router() {
        let server = ProxyServer::new(test_config(), Arc::new(StaticConfigStore::default()));
        let _router = server.router();
        // Router builds successfully
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_resolve_and_decide_off_runtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "a").unwrap();
        let store: Arc<dyn ConfigStore> = Arc::new(StaticConfigStore::new(vec![HostSettings {
            hostname: "foo.com".to_string(),
            docroot: dir.path().to_str().unwrap().to_string(),
            proxy: None,
            always_from_remote: vec![],
            aliases: vec![],
        }]));
        let ctx = Arc::new(RequestContext {
            hostname: "foo.com".to_string(),
            method: RequestMethod::Get,
            raw_path: "/a.html".to_string(),
            query_string: String::new(),
            headers: axum::http::HeaderMap::new(),
            cookies: None,
            body: None,
        });

        let (config, dispatch) = resolve_and_decide(store.clone(), ctx).await.unwrap();
        assert_eq!(config.hostname, "foo.com");
        assert_eq!(dispatch, Dispatch::ServeLocal { path: "/a.html".to_string() });

        let unknown = Arc::new(RequestContext {
            hostname: "bar.com".to_string(),
            method: RequestMethod::Get,
            raw_path: "/".to_string(),
            query_string: String::new(),
            headers: axum::http::HeaderMap::new(),
            cookies: None,
            body: None,
        });
        assert!(matches!(
            resolve_and_decide(store, unknown).await,
            Err(ProxyError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_error_response_status() {
        let response = ProxyError::ConfigNotFound("nope.com".to_string()).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
