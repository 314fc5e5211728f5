//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Dial the resolved backend before completing the client handshake
//! - Negotiate the sub-protocol the backend accepted
//! - Bidirectional message forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Never retried; the replay middleware only sees plain HTTP
//! - A backend that cannot be resolved or dialed answers `502` and the client
//!   connection is never upgraded
//! - `wss` backends are dialed with the proxy's rustls client configuration
//! - Close frames propagated in both directions, codes preserved
//! - Message-level forwarding, no buffering

use axum::body::Body;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap, HeaderName, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::proxy::Proxy;

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client headers carried over to the backend handshake.
const FORWARDED: &[&str] = &[
    "origin",
    "sec-websocket-protocol",
    "cookie",
    "authorization",
    "x-forwarded-for",
    X_REQUEST_ID,
];

/// Whether `headers` belong to a WebSocket handshake.
pub fn is_websocket(headers: &HeaderMap) -> bool {
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));

    upgrade || connection
}

/// Upgrade `request` and relay it to the backend `proxy` resolves.
pub async fn proxy_upgrade(proxy: &Proxy, request: Request<Body>) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            metrics::record_websocket_session("rejected");
            return rejection.into_response();
        }
    };

    let destination = match proxy.resolve(&parts) {
        Ok(destination) => destination,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Failed to resolve websocket backend");
            metrics::record_websocket_session("resolve_failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };
    proxy.rewrite(&mut parts, &destination);

    let handshake = match upstream_request(&parts, &destination) {
        Ok(handshake) => handshake,
        Err(e) => {
            tracing::warn!(destination = %destination, error = %e, "Invalid websocket handshake");
            metrics::record_websocket_session("dial_failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let connector = Connector::Rustls(proxy.tls().clone());
    let dialed = connect_async_tls_with_config(handshake, None, false, Some(connector)).await;
    let (upstream, response) = match dialed {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(destination = %destination, error = %e, "Failed to dial websocket backend");
            metrics::record_websocket_session("dial_failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    tracing::debug!(destination = %destination, "Websocket backend connected");
    upgrade.on_upgrade(move |client| async move {
        relay(client, upstream).await;
        metrics::record_websocket_session("relayed");
        tracing::debug!(destination = %destination, "Websocket session closed");
    })
}

/// Backend handshake request for a rewritten client request.
fn upstream_request(
    parts: &Parts,
    destination: &Url,
) -> Result<tungstenite::handshake::client::Request, tungstenite::Error> {
    let url = if parts.uri.scheme().is_some() {
        parts.uri.to_string()
    } else {
        let mut url = destination.clone();
        url.set_query(parts.uri.query());
        url.to_string()
    };

    let mut handshake = url.into_client_request()?;
    let headers = handshake.headers_mut();

    for name in FORWARDED {
        for value in parts.headers.get_all(*name) {
            headers.append(HeaderName::from_static(name), value.clone());
        }
    }
    if let Some(host) = parts.headers.get(header::HOST) {
        headers.insert(header::HOST, host.clone());
    }

    Ok(handshake)
}

/// Forward messages both ways until either side closes.
async fn relay(mut client: WebSocket, mut upstream: Upstream) {
    loop {
        tokio::select! {
            message = client.recv() => {
                let Some(Ok(message)) = message else { break };
                let closing = matches!(message, ws::Message::Close(_));
                if upstream.send(to_upstream(message)).await.is_err() || closing {
                    break;
                }
            }
            message = upstream.next() => {
                let Some(Ok(message)) = message else { break };
                let closing = message.is_close();
                let Some(message) = to_client(message) else { continue };
                if client.send(message).await.is_err() || closing {
                    break;
                }
            }
        }
    }

    let _ = client.close().await;
    let _ = upstream.close(None).await;
}

fn to_upstream(message: ws::Message) -> UpstreamMessage {
    match message {
        ws::Message::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => UpstreamMessage::Binary(data),
        ws::Message::Ping(data) => UpstreamMessage::Ping(data),
        ws::Message::Pong(data) => UpstreamMessage::Pong(data),
        ws::Message::Close(frame) => UpstreamMessage::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(message: UpstreamMessage) -> Option<ws::Message> {
    let message = match message {
        UpstreamMessage::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        UpstreamMessage::Binary(data) => ws::Message::Binary(data),
        UpstreamMessage::Ping(data) => ws::Message::Ping(data),
        UpstreamMessage::Pong(data) => ws::Message::Pong(data),
        UpstreamMessage::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    };
    Some(message)
}
