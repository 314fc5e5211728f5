//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::request::Parts;

use crate::error::ProxyError;
use crate::load_balancer::Balancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
///
/// The cursor is a wrapping `usize`: after `usize::MAX` it continues at 0 and
/// the chosen index is always `cursor % hosts.len()`, so every host keeps
/// being visited across the wrap.
#[derive(Debug, Default)]
pub struct RoundRobin {
    hosts: Vec<String>,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            counter: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    fn starting_at(hosts: Vec<String>, cursor: usize) -> Self {
        Self {
            hosts,
            counter: AtomicUsize::new(cursor),
        }
    }
}

impl Balancer for RoundRobin {
    fn select(&self, _request: &Parts) -> Result<String, ProxyError> {
        if self.hosts.is_empty() {
            return Err(ProxyError::EmptyBalancerPool {
                strategy: "round_robin",
            });
        }

        // fetch_add wraps on overflow
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(self.hosts[cursor % self.hosts.len()].clone())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
