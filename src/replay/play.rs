//! Per-attempt bookkeeping.

use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::Instant;

/// Record of one attempt at serving a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Play {
    /// Body bytes written by the handler, delivered or not.
    pub bytes: usize,
    /// Number of body write calls.
    pub writes: usize,
    /// Status written by the handler; `None` until one is written.
    pub status: Option<StatusCode>,
    /// Wall time of the attempt, stamped by [`stop`](Self::stop).
    pub elapsed: Duration,

    started: Option<Instant>,
    ended: Option<Instant>,
}

impl Play {
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        let end = Instant::now();
        if let Some(start) = self.started {
            self.elapsed = end.duration_since(start);
        }
        self.ended = Some(end);
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// The attempt was stopped after a status was written.
    pub fn is_finished(&self) -> bool {
        self.ended.is_some() && self.status.is_some()
    }

    /// The attempt wrote a server error status.
    pub fn is_failed(&self) -> bool {
        self.status.is_some_and(|status| status.as_u16() >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let mut play = Play::default();
        assert!(!play.is_failed());

        play.status = Some(StatusCode::NOT_FOUND);
        assert!(!play.is_failed());

        play.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(play.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_stamps_elapsed() {
        let mut play = Play::default();
        play.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!play.is_finished());

        play.status = Some(StatusCode::OK);
        play.stop();
        assert!(play.is_finished());
        assert_eq!(play.elapsed, Duration::from_millis(250));
    }
}
