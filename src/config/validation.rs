//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream has exactly one backend source
//! - Validate value ranges (timeouts > 0, retries >= 1, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::url::{normalize_url, validate_url};

/// A semantic problem in a parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.retries must be at least 1, got {0}")]
    InvalidRetries(u32),

    #[error("upstream needs either a backend or a balancer")]
    MissingBackend,

    #[error("upstream.backend and upstream.balancer are mutually exclusive")]
    ConflictingBackend,

    #[error("upstream.balancer.hosts must not be empty")]
    EmptyBalancerHosts,

    #[error("upstream.backend is not an absolute URL: {0:?}")]
    InvalidBackend(String),

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroTimeout,

    #[error("security.max_body_size must be greater than 0")]
    ZeroBodyLimit,
}

/// Check `config` for semantic errors, collecting every one found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    let upstream = &config.upstream;
    if upstream.retries < 1 {
        errors.push(ValidationError::InvalidRetries(upstream.retries));
    }

    let backend = upstream.backend.as_deref().filter(|b| !b.is_empty());
    match (backend, &upstream.balancer) {
        (Some(_), Some(_)) => errors.push(ValidationError::ConflictingBackend),
        (None, None) => errors.push(ValidationError::MissingBackend),
        (Some(backend), None) => {
            let normalized = normalize_url(backend);
            if normalized.is_empty() || validate_url(&normalized).is_err() {
                errors.push(ValidationError::InvalidBackend(backend.to_string()));
            }
        }
        (None, Some(balancer)) => {
            if balancer.hosts.is_empty() {
                errors.push(ValidationError::EmptyBalancerHosts);
            }
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
