//! Upstream HTTP forwarding.
//!
//! # Responsibilities
//! - Send a rewritten request to its destination
//! - Relay status, end-to-end headers and body frames into a response sink
//! - Turn transport failures into a `502 Bad Gateway`
//!
//! # Design Decisions
//! - HTTP/1.1 over plain TCP or rustls, chosen by the destination scheme
//! - Body frames are streamed as they arrive, never collected; a body that
//!   breaks off aborts the sink so the client never sees it as complete
//! - Hop-by-hop headers are dropped in both directions, including any the
//!   `Connection` header names

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, StatusCode};
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::ProxyError;
use crate::replay::ResponseSink;

/// Headers meaningful only for a single transport-level connection.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
];

/// Remove hop-by-hop headers, plus any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Write an empty `502 Bad Gateway`.
pub fn bad_gateway(sink: &mut dyn ResponseSink) {
    sink.write_head(StatusCode::BAD_GATEWAY);
}

/// Round-trips requests to upstream servers.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HttpForwarder {
    /// Forwarder speaking `http` in the clear and `https` with `tls`.
    pub fn new(tls: Arc<rustls::ClientConfig>) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config((*tls).clone())
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Forward `request` and stream the upstream response into `sink`.
    pub async fn forward(&self, mut request: Request<Body>, sink: &mut dyn ResponseSink) {
        strip_hop_by_hop(request.headers_mut());
        let uri = request.uri().clone();

        let response = match self.client.request(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Upstream request failed");
                bad_gateway(sink);
                return;
            }
        };

        let (mut parts, mut body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        sink.headers().extend(parts.headers);
        sink.write_head(parts.status);

        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Ok(chunk) = frame.into_data() {
                        sink.write(chunk).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "Upstream body aborted");
                    sink.abort(ProxyError::UpstreamBodyFailed(e.to_string())).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::tls;
    use crate::replay::ResponseBuffer;
    use axum::http::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn strips_hop_by_hop_and_connection_listed() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key("content-type"));
        assert!(headers.contains_key("authorization"));
    }

    fn forwarder() -> HttpForwarder {
        HttpForwarder::new(tls::client_config().unwrap())
    }

    /// Serve one canned HTTP response and return the raw request head.
    async fn one_shot(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn relays_status_headers_and_body() {
        let (base, upstream) = one_shot(
            "HTTP/1.1 503 Service Unavailable\r\n\
             connection: close\r\n\
             x-upstream: yes\r\n\
             content-length: 4\r\n\r\nbusy",
        )
        .await;

        let request = Request::builder()
            .uri(format!("{base}/jobs"))
            .header("proxy-authorization", "secret")
            .header("x-client", "1")
            .body(Body::empty())
            .unwrap();

        let mut sink = ResponseBuffer::new();
        forwarder().forward(request, &mut sink).await;

        assert_eq!(sink.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(sink.body(), b"busy");
        assert_eq!(sink.header_map()["x-upstream"], "yes");
        assert!(!sink.header_map().contains_key("connection"));

        let head = upstream.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /jobs http/1.1"));
        assert!(head.contains("x-client: 1"));
        assert!(!head.contains("proxy-authorization"));
    }

    #[tokio::test]
    async fn transport_error_is_bad_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();

        let mut sink = ResponseBuffer::new();
        forwarder().forward(request, &mut sink).await;

        assert_eq!(sink.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(sink.body().is_empty());
    }

    #[tokio::test]
    async fn truncated_body_aborts_sink() {
        let (base, _upstream) = one_shot(
            "HTTP/1.1 200 OK\r\n\
             transfer-encoding: chunked\r\n\r\n\
             5\r\nhello\r\n",
        )
        .await;

        let request = Request::builder()
            .uri(format!("{base}/stream"))
            .body(Body::empty())
            .unwrap();

        let mut sink = ResponseBuffer::new();
        forwarder().forward(request, &mut sink).await;

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert_eq!(sink.body(), b"hello");
        assert!(matches!(sink.aborted(), Some(ProxyError::UpstreamBodyFailed(_))));
    }

    #[tokio::test]
    async fn tls_handshake_failure_is_bad_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        });

        let request = Request::builder()
            .uri(format!("https://{addr}/"))
            .body(Body::empty())
            .unwrap();

        let mut sink = ResponseBuffer::new();
        forwarder().forward(request, &mut sink).await;

        assert_eq!(sink.status(), Some(StatusCode::BAD_GATEWAY));
    }
}
