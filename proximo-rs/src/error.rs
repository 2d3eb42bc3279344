//! Error types for proximo-rs

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Proxy error types
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No host entry or alias for the requested hostname
    #[error("Settings not defined for hostname '{0}'")]
    ConfigNotFound(String),

    /// Docroot is empty or does not exist
    #[error("Invalid docroot '{docroot}' for hostname '{hostname}'")]
    InvalidDocroot { hostname: String, docroot: String },

    /// Network failure talking to the remote host
    #[error("Upstream error from {host}: {message}")]
    Upstream { host: String, message: String },

    /// Remote host did not answer in time
    #[error("Upstream {host} timed out after {timeout:?}")]
    UpstreamTimeout { host: String, timeout: Duration },

    /// Method other than GET or POST
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// POST body larger than the configured limit
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Request could not be turned into a request context
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ProxyError {
    /// HTTP status reported to the client for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Config(_) | ProxyError::Io(_) | ProxyError::InvalidDocroot { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the failure was caused by the client rather than the proxy or upstream
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::ConfigNotFound("foo.com".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProxyError::Upstream {
                host: "bar.com".into(),
                message: "connection refused".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::UpstreamTimeout {
                host: "bar.com".into(),
                timeout: Duration::from_secs(5)
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 16 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert!(ProxyError::UnsupportedMethod("PUT".into()).is_client_error());
        assert!(!ProxyError::Config("bad".into()).is_client_error());
    }
}
