//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request parts
//!     → resolver.rs (balancer or static backend)
//!     → url.rs (normalize → validate → scheme family → join paths)
//!     → rewrite.rs (scheme, authority, path, Host header)
//!     → Outbound request ready for the forwarder or websocket relay
//! ```
//!
//! # Design Decisions
//! - Pure functions for URL handling; no I/O in this module
//! - One scheme table shared by normalization and rewriting
//! - Resolution errors are request-scoped, never fatal to the process

pub mod resolver;
pub mod rewrite;
pub mod url;

pub use resolver::{BackendResolver, BackendSource};
pub use rewrite::{default_rewriter, rewrite_request, Rewriter};
