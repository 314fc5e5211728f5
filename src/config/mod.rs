//! Proxy configuration: TOML file, CLI overrides, hot reload.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → ProxyOptions::from_config → Proxy
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server builds a new Proxy and swaps it in atomically
//! ```
//!
//! # Design Decisions
//! - A loaded `ProxyConfig` is never mutated; a reload produces a new value
//! - Every section has defaults, so a file naming only a backend is valid
//! - serde rejects malformed input; `validate_config` rejects nonsense values
//!   and reports all of them at once
//! - Only the upstream section is hot-reloaded; listener, timeouts and
//!   observability changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    BalancerConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, SecurityConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
