//! Logs and metrics for the proxy.
//!
//! # Data Flow
//! ```text
//! server, replay middleware, websocket relay
//!     → tracing events  → logging.rs subscriber (stdout, pretty or JSON)
//!     → metrics macros  → metrics.rs recorder → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Attempt outcomes and exhausted retries are counted separately from
//!   client-visible responses
//! - WebSocket sessions are counted by outcome, never timed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
