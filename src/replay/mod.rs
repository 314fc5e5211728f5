//! Request replay subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → target.rs (drain body once, keep a replayable snapshot)
//!     → middleware.rs (retry executor over attempts)
//!         → replayer.rs (fresh request per attempt, guards the sink)
//!         → inner ReplayHandler writes into the replayer
//!         → play.rs (per-attempt status, byte and write counters)
//!     → sink.rs (real response sink: buffered or streamed)
//! ```
//!
//! # Design Decisions
//! - An attempt fails when it writes a status of 500 or above
//! - Output of failed attempts never reaches the client
//! - Whatever a successful attempt writes is committed immediately
//! - The whole request body is held in memory, bounded by a body limit
//! - The response body is not: a streaming sink holds a few chunks and makes
//!   the writer wait for the client

pub mod middleware;
pub mod play;
pub mod replayer;
pub mod sink;
pub mod target;

pub use middleware::{
    DefaultFailureHandler, FailureHandler, ReplayHandler, ReplayMiddleware, DEFAULT_BODY_LIMIT,
};
pub use play::Play;
pub use replayer::Replayer;
pub use sink::{ChannelSink, PendingResponse, ResponseBuffer, ResponseSink, BODY_CHANNEL_CAPACITY};
pub use target::Target;
