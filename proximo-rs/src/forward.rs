//! Remote forwarding
//!
//! Sends one request to the remote host with a fixed header whitelist and
//! turns the answer into a [`ProxyResponse`] whose `Location` points back at
//! the hostname the client asked for.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use std::time::Duration;
use tracing::{debug, error};

use crate::context::{RequestContext, RequestMethod};
use crate::error::{ProxyError, Result};

/// HTTP client type for forwarding requests
type HttpClient = Client<hyper_util::client::legacy::connect::HttpConnector, Body>;

/// Rewritten response from the remote host
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub set_cookie: Vec<HeaderValue>,
    /// `Location` with the remote host replaced by the requested hostname
    pub location: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        for cookie in self.set_cookie {
            headers.append(header::SET_COOKIE, cookie);
        }
        if let Some(location) = self.location {
            headers.insert(header::LOCATION, location);
        }

        response
    }
}

/// Replace every occurrence of `remote_host` in a `Location` value
///
/// Works on raw header bytes so values carrying obs-text are rewritten too.
pub fn rewrite_location(location: &[u8], remote_host: &str, hostname: &str) -> Vec<u8> {
    let needle = remote_host.as_bytes();
    if needle.is_empty() {
        return location.to_vec();
    }

    let mut rewritten = Vec::with_capacity(location.len());
    let mut rest = location;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        rewritten.extend_from_slice(&rest[..pos]);
        rewritten.extend_from_slice(hostname.as_bytes());
        rest = &rest[pos + needle.len()..];
    }
    rewritten.extend_from_slice(rest);
    rewritten
}

/// Build the outbound request for `path` on `remote_host`
pub fn build_upstream_request(
    remote_host: &str,
    path: &str,
    ctx: &RequestContext,
) -> Result<Request<Body>> {
    // The `?` is kept even for an empty query string.
    let target = format!("http://{}{}?{}", remote_host, path, ctx.query_string);
    let uri: Uri = target
        .parse()
        .map_err(|e| ProxyError::BadRequest(format!("Invalid upstream URI '{}': {}", target, e)))?;

    let mut headers = HeaderMap::new();
    if let Some(cookies) = &ctx.cookies {
        headers.insert(header::COOKIE, cookies.clone());
    }
    if ctx.method == RequestMethod::Post {
        if let Some(content_type) = ctx.headers.get(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
    }
    if let Some(user_agent) = ctx.headers.get(header::USER_AGENT) {
        headers.insert(header::USER_AGENT, user_agent.clone());
    }
    if let Some(referer) = ctx.headers.get(header::REFERER) {
        headers.insert(header::REFERER, referer.clone());
    }

    let (method, body) = match ctx.method {
        RequestMethod::Get => (Method::GET, Body::empty()),
        RequestMethod::Post => (Method::POST, Body::from(ctx.body.clone().unwrap_or_default())),
    };

    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;

    Ok(request)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Forwards requests to remote hosts
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder whose calls give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let client: HttpClient = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build_http();

        Self { client, timeout }
    }

    /// Send `ctx` to `remote_host` and rewrite the answer for the client
    pub async fn forward(
        &self,
        remote_host: &str,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<ProxyResponse> {
        let request = build_upstream_request(remote_host, path, ctx)?;
        debug!("Forwarding {} {} to {}", ctx.method.as_str(), request.uri(), remote_host);

        let exchange = async {
            let response = self.client.request(request).await.map_err(|e| ProxyError::Upstream {
                host: remote_host.to_string(),
                message: error_chain(&e),
            })?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| ProxyError::Upstream {
                    host: remote_host.to_string(),
                    message: error_chain(&e),
                })?
                .to_bytes();

            Ok::<_, ProxyError>((parts, body))
        };

        let (parts, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout {
                host: remote_host.to_string(),
                timeout: self.timeout,
            })??;

        let location = parts.headers.get(header::LOCATION).map(|value| {
            let rewritten = rewrite_location(value.as_bytes(), remote_host, &ctx.hostname);
            HeaderValue::from_bytes(&rewritten).unwrap_or_else(|e| {
                error!("Rewritten Location {:?} is not a valid header: {}", value, e);
                value.clone()
            })
        });

        debug!("Upstream {} answered {}", remote_host, parts.status);

        Ok(ProxyResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            set_cookie: parts.headers.get_all(header::SET_COOKIE).iter().cloned().collect(),
            location,
            body,
        })
    }
}
