//! Request replay and response interception.
//!
//! # State Machine
//! ```text
//! capture() ──▶ Ready ──replay()──▶ Replaying ──failure()?──▶ stop() ──▶ Ready
//!                                        │
//!                                        └── success / budget spent ──▶ finish() (Done)
//! ```
//!
//! While replaying, the replayer is the handler's response sink. Writes pass
//! through to the real sink unless the current attempt already recorded a
//! server error, in which case they are dropped and only counted. Headers are
//! staged per attempt and reach the real sink together with the first
//! pass-through write. Aborting a failed attempt is a no-op since its output
//! never left; aborting a committed one reaches the real sink.

use std::mem;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;

use crate::error::ProxyError;
use crate::replay::play::Play;
use crate::replay::sink::ResponseSink;
use crate::replay::target::Target;

/// Replays one inbound request and guards its response sink.
pub struct Replayer<'a> {
    sink: &'a mut dyn ResponseSink,
    target: Target,
    play: Play,
    plays: Vec<Play>,
    headers: HeaderMap,
    committed: bool,
}

impl<'a> Replayer<'a> {
    /// Capture `request` and wrap `sink`.
    pub async fn capture(
        request: Request<Body>,
        sink: &'a mut dyn ResponseSink,
        body_limit: usize,
    ) -> Result<Replayer<'a>, ProxyError> {
        let target = Target::capture(request, body_limit).await?;
        Ok(Self::new(target, sink))
    }

    pub fn new(target: Target, sink: &'a mut dyn ResponseSink) -> Self {
        Self {
            sink,
            target,
            play: Play::default(),
            plays: Vec::new(),
            headers: HeaderMap::new(),
            committed: false,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The attempt in progress.
    pub fn play(&self) -> &Play {
        &self.play
    }

    /// Archived attempts, oldest first.
    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    /// Start an attempt and build its request.
    pub fn replay(&mut self) -> Result<Request<Body>, ProxyError> {
        self.play.start();
        self.target.request()
    }

    /// Error describing the current attempt, if it failed.
    pub fn failure(&self) -> Option<ProxyError> {
        match self.play.status {
            Some(status) if self.play.is_failed() => Some(ProxyError::AttemptFailed { status }),
            _ => None,
        }
    }

    /// Archive the current attempt and get ready for the next one.
    pub fn stop(&mut self) {
        self.play.stop();
        self.plays.push(mem::take(&mut self.play));
        self.headers.clear();
        self.committed = false;
    }

    /// End replaying. Returns the real sink, the target and every attempt.
    pub fn finish(mut self) -> (&'a mut dyn ResponseSink, Target, Vec<Play>) {
        if self.play.is_started() {
            self.play.stop();
            self.plays.push(self.play);
        }
        (self.sink, self.target, self.plays)
    }

    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let staged = mem::take(&mut self.headers);
        self.sink.headers().extend(staged);
    }
}

#[async_trait]
impl<'a> ResponseSink for Replayer<'a> {
    fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(ignored = %status, "Superfluous write_head call");
            return;
        }

        self.play.status = Some(status);
        if self.play.is_failed() {
            tracing::trace!(%status, "Suppressing failed attempt head");
            return;
        }

        self.commit();
        self.sink.write_head(status);
    }

    async fn write(&mut self, chunk: Bytes) {
        self.play.bytes += chunk.len();
        self.play.writes += 1;

        if self.play.is_failed() {
            return;
        }

        self.commit();
        self.sink.write(chunk).await;
    }

    async fn abort(&mut self, error: ProxyError) {
        if self.play.is_failed() {
            tracing::debug!(error = %error, "Failed attempt broke off");
            return;
        }

        self.commit();
        self.sink.abort(error).await;
    }
}
