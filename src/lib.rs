//! Reverse proxy with transparent request replay.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                      REPLAY PROXY                        │
//!                    │                                                          │
//!  Client Request    │  ┌─────────┐    upgrade?    ┌───────────────┐            │
//!  ──────────────────┼─▶│  http   │───────yes─────▶│ http::websocket│──────────┼──▶ Backend
//!                    │  │ server  │                └───────────────┘            │   (ws/wss)
//!                    │  └────┬────┘                                             │
//!                    │       │ no                                               │
//!                    │       ▼                                                  │
//!                    │  ┌─────────────────┐   attempt   ┌───────────┐           │
//!                    │  │ replay          │────────────▶│  proxy    │───────────┼──▶ Backend
//!                    │  │ middleware      │◀── 5xx? ────│ + forward │           │   (http)
//!                    │  │ (retries)       │             └─────┬─────┘           │
//!                    │  └────────┬────────┘                   │                 │
//!                    │           │                     ┌─────▼──────┐          │
//!  Client Response   │           │                     │  routing   │          │
//!  ◀─────────────────┼───────────┘                     │ + balancer │          │
//!                    │                                 └────────────┘          │
//!                    │                                                          │
//!                    │  Cross-cutting: config (hot reload), observability,      │
//!                    │  resilience (retry executor), lifecycle                  │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod replay;
pub mod resilience;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{Proxy, ProxyOptions};
pub use replay::{ReplayHandler, ReplayMiddleware, ResponseSink};
