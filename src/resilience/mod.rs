//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt at a fallible operation:
//!     → retries.rs (run, classify result, wait, run again)
//!     → last error once the attempt budget is spent
//! ```
//!
//! # Design Decisions
//! - The executor is generic; HTTP classification lives in the replay layer
//! - Fixed delay between attempts, no backoff growth
//! - Request-level deadlines come from the server's timeout layer

pub mod retries;

pub use retries::{retry_wait, InvalidRetryConfig, RetryError, RetryPolicy};
