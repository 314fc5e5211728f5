//! Random load balancing strategy.

use axum::http::request::Parts;
use rand::Rng;

use crate::error::ProxyError;
use crate::load_balancer::Balancer;

/// Picks a uniformly random host per request.
/// This does not guarantee an even split over any short window.
#[derive(Debug, Default)]
pub struct Random {
    hosts: Vec<String>,
}

impl Random {
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts }
    }
}

impl Balancer for Random {
    fn select(&self, _request: &Parts) -> Result<String, ProxyError> {
        if self.hosts.is_empty() {
            return Err(ProxyError::EmptyBalancerPool { strategy: "random" });
        }

        let index = rand::thread_rng().gen_range(0..self.hosts.len());
        Ok(self.hosts[index].clone())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
