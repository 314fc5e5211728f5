//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, dispatch)
//!     → request.rs (request ID, X-Forwarded-For)
//!     → websocket.rs (upgrade requests, relayed without replay)
//!     → replay middleware + proxy (everything else)
//!     → Send to client
//! ```

pub mod request;
pub mod server;
pub mod websocket;

pub use request::{MakeRequestUuid, X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
pub use websocket::{is_websocket, proxy_upgrade};
