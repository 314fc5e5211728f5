//! Error types shared by the proxy core.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that can occur while resolving, replaying or forwarding a request.
///
/// Everything here is request-scoped except the construction variants
/// (`InvalidRetryConfig`, `MissingBackend`, `ConflictingBackend`, `Tls`), which
/// `Proxy::new` reports before any traffic is served.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A balancer was asked for a host but has none configured.
    #[error("{strategy} balancer can not work on an empty host list")]
    EmptyBalancerPool { strategy: &'static str },

    /// The backend does not normalize/validate to an absolute URL.
    #[error("invalid backend url {0:?}: proxy must only proxy to absolute URLs")]
    InvalidUrl(String),

    /// The backend URL could not be parsed.
    #[error("failed to parse backend url: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Retry executor configured with fewer than one attempt.
    #[error("retry count must be at least 1, got {0}")]
    InvalidRetryConfig(u32),

    /// The inbound body could not be captured for replay.
    #[error("failed to read request body: {0}")]
    BodyReadFailed(String),

    /// Neither a balancer nor a static backend was supplied.
    #[error("please provide a backend or a balancer")]
    MissingBackend,

    /// Both a balancer and a static backend were supplied.
    #[error("a backend and a balancer are mutually exclusive")]
    ConflictingBackend,

    /// An attempt finished with a server error status.
    #[error("upstream responded with status {status}")]
    AttemptFailed { status: StatusCode },

    /// The upstream response body broke off after its head was relayed.
    #[error("upstream response body failed: {0}")]
    UpstreamBodyFailed(String),

    /// The TLS client configuration for backends could not be built.
    #[error("failed to configure backend TLS: {0}")]
    Tls(#[from] rustls::Error),

    /// A request could not be rebuilt from its captured parts.
    #[error("failed to build request: {0}")]
    Http(#[from] axum::http::Error),
}

impl ProxyError {
    /// Returns true for errors raised at construction time.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ProxyError::InvalidRetryConfig(_)
                | ProxyError::MissingBackend
                | ProxyError::ConflictingBackend
                | ProxyError::Tls(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_failure_message_carries_status() {
        let err = ProxyError::AttemptFailed {
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.to_string(), "upstream responded with status 503 Service Unavailable");
        assert!(!err.is_config_error());
    }

    #[test]
    fn construction_errors_are_flagged() {
        assert!(ProxyError::InvalidRetryConfig(0).is_config_error());
        assert!(ProxyError::MissingBackend.is_config_error());
        assert!(!ProxyError::EmptyBalancerPool { strategy: "random" }.is_config_error());
    }
}
