//! Retry-with-replay middleware.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use bytes::Bytes;

use crate::error::ProxyError;
use crate::observability::metrics;
use crate::replay::play::Play;
use crate::replay::replayer::Replayer;
use crate::replay::sink::ResponseSink;
use crate::replay::target::Target;
use crate::resilience::retries::RetryPolicy;

/// Largest request body captured for replay by default (2MB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A handler whose requests can be replayed.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    /// Serve `request`, writing the response into `sink`.
    async fn serve(&self, request: Request<Body>, sink: &mut dyn ResponseSink);
}

/// Produces the client response once every attempt failed.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    async fn respond(&self, target: &Target, sink: &mut dyn ResponseSink, error: &ProxyError);
}

/// Plain-text `500` carrying the error message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFailureHandler;

#[async_trait]
impl FailureHandler for DefaultFailureHandler {
    async fn respond(&self, _target: &Target, sink: &mut dyn ResponseSink, error: &ProxyError) {
        let headers = sink.headers();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        sink.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        sink.write(Bytes::from(format!("{error}\n"))).await;
    }
}

/// Wraps a [`ReplayHandler`] so server errors are retried transparently.
pub struct ReplayMiddleware<H> {
    policy: RetryPolicy,
    handler: H,
    on_failure: Arc<dyn FailureHandler>,
    body_limit: usize,
}

impl<H: ReplayHandler> ReplayMiddleware<H> {
    pub fn new(policy: RetryPolicy, handler: H) -> Self {
        Self {
            policy,
            handler,
            on_failure: Arc::new(DefaultFailureHandler),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Replace the response written after the last failed attempt.
    pub fn with_failure_handler<F>(mut self, on_failure: F) -> Self
    where
        F: FailureHandler + 'static,
    {
        self.on_failure = Arc::new(on_failure);
        self
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Serve `request` through the wrapped handler, retrying failed attempts.
    ///
    /// Returns the attempt history once the client has been answered. An
    /// error means the request could not be captured; nothing was written to
    /// `sink` and the caller should drop the connection.
    pub async fn serve(
        &self,
        request: Request<Body>,
        sink: &mut dyn ResponseSink,
    ) -> Result<Vec<Play>, ProxyError> {
        let replayer = match Replayer::capture(request, sink, self.body_limit).await {
            Ok(replayer) => replayer,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to capture request for replay");
                return Err(e);
            }
        };

        let handler = &self.handler;
        let (replayer, result) = self
            .policy
            .run_with(replayer, |mut replayer| async move {
                let request = match replayer.replay() {
                    Ok(request) => request,
                    Err(e) => return (replayer, Err(e)),
                };

                handler.serve(request, &mut replayer).await;

                let outcome = match replayer.failure() {
                    Some(e) => {
                        tracing::debug!(error = %e, "Attempt failed, output discarded");
                        metrics::record_attempt(false);
                        replayer.stop();
                        Err(e)
                    }
                    None => {
                        metrics::record_attempt(true);
                        Ok(())
                    }
                };
                (replayer, outcome)
            })
            .await;

        let (sink, target, plays) = replayer.finish();

        if let Err(e) = result {
            tracing::warn!(
                method = %target.method(),
                uri = %target.uri(),
                attempts = plays.len(),
                error = %e,
                "Retries exhausted"
            );
            metrics::record_retries_exhausted();
            self.on_failure.respond(&target, sink, &e).await;
        }

        Ok(plays)
    }
}
