//! WebSocket relay through the proxy.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};

mod common;

#[tokio::test]
async fn relays_messages_and_negotiates_protocol() {
    let backend = common::start_ws_echo().await;
    let proxy = common::start_proxy(common::backend_config(&backend.to_string(), 1)).await;

    let mut request = format!("ws://{}/chat", proxy.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("sec-websocket-protocol", "chat.v2".parse().unwrap());

    let (mut ws, response) = connect_async(request).await.expect("upgrade failed");
    assert_eq!(response.headers()["sec-websocket-protocol"], "chat.v2");

    ws.send(Message::Text("hello".into())).await.unwrap();
    assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("hello".into()));

    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    assert_eq!(
        ws.next().await.unwrap().unwrap(),
        Message::Binary(vec![1u8, 2, 3].into())
    );

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_refuses_upgrade() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let proxy = common::start_proxy(common::backend_config(&addr.to_string(), 1)).await;

    match connect_async(format!("ws://{}/chat", proxy.addr)).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 502),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}
