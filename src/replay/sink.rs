//! Response sinks.
//!
//! A sink receives one response: headers first, then a status written once,
//! then body chunks. Writing a chunk before any status implies `200 OK`.
//! A sink can be aborted after its head went out; the client then sees a
//! broken body instead of a complete response.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};

use crate::error::ProxyError;

/// Body chunks a [`ChannelSink`] holds before writes wait for the client.
pub const BODY_CHANNEL_CAPACITY: usize = 16;

/// Destination for a proxied response.
#[async_trait]
pub trait ResponseSink: Send {
    /// Response headers, writable until the status is written.
    fn headers(&mut self) -> &mut HeaderMap;

    /// Write the status line together with the current headers.
    fn write_head(&mut self, status: StatusCode);

    /// Write a body chunk, waiting while the reader is behind.
    async fn write(&mut self, chunk: Bytes);

    /// Fail the response. Output already written stays written, but the body
    /// never completes.
    async fn abort(&mut self, error: ProxyError);
}

/// Sink that keeps the whole response in memory.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    writes: usize,
    aborted: Option<ProxyError>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Number of body writes received.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Why the response was aborted, if it was.
    pub fn aborted(&self) -> Option<&ProxyError> {
        self.aborted.as_ref()
    }

    /// Convert into a response. An untouched buffer becomes an empty `200 OK`;
    /// an aborted one gets a body that fails after the buffered bytes.
    pub fn into_response(self) -> Response<Body> {
        let body = self.body.freeze();
        let body = match self.aborted {
            Some(error) => Body::from_stream(futures_util::stream::iter([Ok(body), Err(error)])),
            None => Body::from(body),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl ResponseSink for ResponseBuffer {
    fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(%current, ignored = %status, "Superfluous write_head call");
            return;
        }
        self.status = Some(status);
    }

    async fn write(&mut self, chunk: Bytes) {
        if self.aborted.is_some() {
            return;
        }
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(&chunk);
        self.writes += 1;
    }

    async fn abort(&mut self, error: ProxyError) {
        if self.aborted.is_none() {
            self.aborted = Some(error);
        }
    }
}

type Head = (StatusCode, HeaderMap);
type Chunk = Result<Bytes, ProxyError>;

/// Streaming sink: the head goes out as soon as it is written, body chunks
/// follow through a bounded channel.
#[derive(Debug)]
pub struct ChannelSink {
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<Chunk>,
    aborted: bool,
}

/// Receiving half of a [`ChannelSink`].
#[derive(Debug)]
pub struct PendingResponse {
    head: oneshot::Receiver<Head>,
    body: mpsc::Receiver<Chunk>,
}

impl ChannelSink {
    pub fn new() -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            Self {
                headers: HeaderMap::new(),
                head: Some(head_tx),
                body: body_tx,
                aborted: false,
            },
            PendingResponse {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.body.is_closed()
    }

    /// Close the sink, sending an implicit `200 OK` head if none was written.
    pub fn finish(mut self) {
        if self.head.is_some() {
            self.write_head(StatusCode::OK);
        }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        let Some(head) = self.head.take() else {
            tracing::warn!(ignored = %status, "Superfluous write_head call");
            return;
        };
        let headers = std::mem::take(&mut self.headers);
        // The receiver is gone when the client disconnected.
        let _ = head.send((status, headers));
    }

    async fn write(&mut self, chunk: Bytes) {
        if self.aborted {
            return;
        }
        if self.head.is_some() {
            self.write_head(StatusCode::OK);
        }
        let _ = self.body.send(Ok(chunk)).await;
    }

    async fn abort(&mut self, error: ProxyError) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        if self.head.is_some() {
            self.write_head(StatusCode::BAD_GATEWAY);
        }
        let _ = self.body.send(Err(error)).await;
    }
}

impl PendingResponse {
    /// Wait for the head and stream the body behind it.
    ///
    /// Returns `None` when the sink was dropped without writing a head.
    pub async fn into_response(self) -> Option<Response<Body>> {
        let (status, headers) = self.head.await.ok()?;

        let chunks = futures_util::stream::unfold(self.body, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        let mut response = Response::new(Body::from_stream(chunks));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Some(response)
    }
}
