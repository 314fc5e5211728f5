//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request parts
//!     → Balancer::select (pluggable strategy)
//!         - round_robin.rs (rotate through hosts)
//!         - random.rs (uniform pick per request)
//!         - any Fn(&Parts) -> Result<String, ProxyError>
//!     → raw backend host string
//!     → routing::resolver (normalize, validate, join paths)
//! ```
//!
//! # Design Decisions
//! - Strategies return raw host strings; URL handling belongs to routing
//! - Per-strategy state lives inside the strategy object, never in globals
//! - Strategies are shared by all in-flight requests and must be `Sync`

pub mod random;
pub mod round_robin;

use std::sync::Arc;

use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

pub use random::Random;
pub use round_robin::RoundRobin;

/// Selects a backend host for a request.
pub trait Balancer: Send + Sync {
    /// Pick the raw backend string for this request.
    fn select(&self, request: &Parts) -> Result<String, ProxyError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> Balancer for F
where
    F: Fn(&Parts) -> Result<String, ProxyError> + Send + Sync,
{
    fn select(&self, request: &Parts) -> Result<String, ProxyError> {
        self(request)
    }
}

/// Built-in strategies selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancerStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// Build a shared balancer for the given strategy and host list.
pub fn build_balancer(strategy: BalancerStrategy, hosts: Vec<String>) -> Arc<dyn Balancer> {
    match strategy {
        BalancerStrategy::RoundRobin => Arc::new(RoundRobin::new(hosts)),
        BalancerStrategy::Random => Arc::new(Random::new(hosts)),
    }
}

#[cfg(test)]
pub(crate) fn test_parts(path: &str) -> Parts {
    let (parts, _) = axum::http::Request::builder()
        .uri(path)
        .body(())
        .unwrap()
        .into_parts();
    parts
}
