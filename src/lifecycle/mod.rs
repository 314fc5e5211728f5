//! Process lifecycle: bring the proxy up, take it down on a signal.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics → proxy → config watcher → listener
//!
//! Signals (signals.rs):
//!     SIGINT or SIGTERM (Ctrl+C off unix)
//!     → Shutdown::trigger (shutdown.rs), broadcast to the server
//!     → axum stops accepting and drains in-flight requests
//! ```
//!
//! # Design Decisions
//! - The listener is bound last so a bad config never leaves a port open
//! - A metrics exporter that fails to start is logged, not fatal
//! - Triggering twice is a no-op

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::StartupError;
