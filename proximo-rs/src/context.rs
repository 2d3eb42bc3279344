//! Per-request context
//!
//! Everything the dispatcher and forwarder need from the incoming request,
//! captured once and never mutated afterwards.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::{ProxyError, Result};

/// Request methods the proxy handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        }
    }
}

impl TryFrom<&Method> for RequestMethod {
    type Error = ProxyError;

    fn try_from(method: &Method) -> Result<Self> {
        if method == Method::GET {
            Ok(RequestMethod::Get)
        } else if method == Method::POST {
            Ok(RequestMethod::Post)
        } else {
            Err(ProxyError::UnsupportedMethod(method.to_string()))
        }
    }
}

/// Immutable view of one incoming request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Requested hostname, without port
    pub hostname: String,
    pub method: RequestMethod,
    /// Path as received (still percent-encoded)
    pub raw_path: String,
    /// Query string without the leading `?`, possibly empty
    pub query_string: String,
    pub headers: HeaderMap,
    /// Raw `Cookie` header bytes, only when non-empty
    pub cookies: Option<HeaderValue>,
    /// Request body, only for POST
    pub body: Option<Bytes>,
}

impl RequestContext {
    /// Capture a request, reading at most `max_body_bytes` of a POST body
    pub async fn from_request(req: Request<Body>, max_body_bytes: usize) -> Result<Self> {
        let method = RequestMethod::try_from(req.method())?;

        let (parts, body) = req.into_parts();

        let hostname = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .map(strip_port)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProxyError::BadRequest("missing Host header".to_string()))?
            .to_string();

        let cookies = cookie_header(&parts.headers);

        let body = match method {
            RequestMethod::Post => Some(read_body(body, max_body_bytes).await?),
            RequestMethod::Get => None,
        };

        Ok(Self {
            hostname,
            method,
            raw_path: parts.uri.path().to_string(),
            query_string: parts.uri.query().unwrap_or_default().to_string(),
            headers: parts.headers,
            cookies,
            body,
        })
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ProxyError::PayloadTooLarge { limit })
        }
        Err(e) => Err(ProxyError::BadRequest(format!("failed to read body: {}", e))),
    }
}

/// Drop a trailing `:port`, keeping bracketed IPv6 literals intact
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

fn cookie_header(headers: &HeaderMap) -> Option<HeaderValue> {
    let values: Vec<&HeaderValue> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter(|v| !v.as_bytes().trim_ascii().is_empty())
        .collect();

    match values.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        many => {
            // HTTP/2 may split cookies across several fields; HTTP/1 joins them with "; ".
            let joined = many
                .iter()
                .map(|v| v.as_bytes().trim_ascii())
                .collect::<Vec<_>>()
                .join(&b"; "[..]);
            HeaderValue::from_bytes(&joined).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("foo.com:8080"), "foo.com");
        assert_eq!(strip_port("foo.com"), "foo.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }

    #[tokio::test]
    async fn test_from_get_request() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/blog/?page=2")
            .header("host", "foo.com:80")
            .header("cookie", "session=abc")
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(req, 1024).await.unwrap();
        assert_eq!(ctx.hostname, "foo.com");
        assert_eq!(ctx.method, RequestMethod::Get);
        assert_eq!(ctx.raw_path, "/blog/");
        assert_eq!(ctx.query_string, "page=2");
        assert_eq!(ctx.cookies.unwrap(), "session=abc");
        assert!(ctx.body.is_none());
    }

    #[tokio::test]
    async fn test_from_post_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/form")
            .header("host", "foo.com")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("a=1&b=2"))
            .unwrap();

        let ctx = RequestContext::from_request(req, 1024).await.unwrap();
        assert_eq!(ctx.method, RequestMethod::Post);
        assert_eq!(ctx.query_string, "");
        assert!(ctx.cookies.is_none());
        assert_eq!(ctx.body.as_deref(), Some(&b"a=1&b=2"[..]));
    }

    #[tokio::test]
    async fn test_cookie_bytes_kept_verbatim() {
        let req = Request::builder()
            .uri("/")
            .header("host", "foo.com")
            .header("cookie", HeaderValue::from_bytes(b"name=caf\xe9").unwrap())
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(req, 1024).await.unwrap();
        assert_eq!(ctx.cookies.unwrap().as_bytes(), b"name=caf\xe9");
    }

    #[test]
    fn test_split_cookie_fields_joined() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static(" "));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));

        assert_eq!(cookie_header(&headers).unwrap(), "a=1; b=2");
        assert!(cookie_header(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_rejects_other_methods() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/")
            .header("host", "foo.com")
            .body(Body::empty())
            .unwrap();

        let err = RequestContext::from_request(req, 1024).await.unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedMethod(ref m) if m == "PUT"));
    }

    #[tokio::test]
    async fn test_missing_host() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(matches!(
            RequestContext::from_request(req, 1024).await,
            Err(ProxyError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("host", "foo.com")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();

        assert!(matches!(
            RequestContext::from_request(req, 16).await,
            Err(ProxyError::PayloadTooLarge { limit: 16 })
        ));
    }
}
