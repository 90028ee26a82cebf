use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hubsub_broker::engine::{Broker, Limits};
use hubsub_broker::protocol::{ServerEnvelope, CODE_TOPIC_NOT_FOUND};
use hubsub_client::PubSubClient;

use crate::server;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(limits: Limits) -> (Arc<Broker>, String) {
    let broker = Arc::new(Broker::new(limits));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, broker.clone()));
    (broker, format!("ws://{addr}/ws"))
}

async fn connect(url: &str) -> WsStream {
    let (stream, _) = connect_async(url).await.expect("websocket handshake failed");
    stream
}

async fn send_json(ws: &mut WsStream, frame: serde_json::Value) {
    ws.send(WsMessage::Text(frame.to_string().into()))
        .await
        .expect("failed to send frame");
}

async fn next_envelope(ws: &mut WsStream) -> ServerEnvelope {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for envelope")
            .expect("connection closed")
            .expect("websocket read failed");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("unparseable envelope");
        }
    }
}

#[tokio::test]
async fn test_subscribe_publish_over_websocket() {
    let (broker, url) = start_server(Limits::default()).await;
    broker.create_topic("a").unwrap();

    let mut subscriber = connect(&url).await;
    send_json(
        &mut subscriber,
        json!({"type": "subscribe", "topic": "a", "client_id": "c1", "request_id": "r1"}),
    )
    .await;
    match next_envelope(&mut subscriber).await {
        ServerEnvelope::Ack { request_id, topic, .. } => {
            assert_eq!(request_id.as_deref(), Some("r1"));
            assert_eq!(topic, "a");
        }
        other => panic!("expected ack, got {other:?}"),
    }

    let mut publisher = connect(&url).await;
    send_json(
        &mut publisher,
        json!({"type": "publish", "topic": "a",
               "message": {"id": "11111111-1111-1111-1111-111111111111", "payload": {"v": 1}}}),
    )
    .await;
    assert!(matches!(
        next_envelope(&mut publisher).await,
        ServerEnvelope::Ack { .. }
    ));

    match next_envelope(&mut subscriber).await {
        ServerEnvelope::Event { topic, message, .. } => {
            assert_eq!(topic, "a");
            assert_eq!(message.id, "11111111-1111-1111-1111-111111111111");
            assert_eq!(message.payload, json!({"v": 1}));
        }
        other => panic!("expected event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_topic_over_websocket() {
    let (_broker, url) = start_server(Limits::default()).await;
    let mut ws = connect(&url).await;
    send_json(
        &mut ws,
        json!({"type": "subscribe", "topic": "missing", "client_id": "c1"}),
    )
    .await;
    match next_envelope(&mut ws).await {
        ServerEnvelope::Error { error, .. } => assert_eq!(error.code, CODE_TOPIC_NOT_FOUND),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_closes_subscriber_connections() {
    let (broker, url) = start_server(Limits::default()).await;
    broker.create_topic("doomed").unwrap();

    let mut ws = connect(&url).await;
    send_json(
        &mut ws,
        json!({"type": "subscribe", "topic": "doomed", "client_id": "c1"}),
    )
    .await;
    assert!(matches!(
        next_envelope(&mut ws).await,
        ServerEnvelope::Ack { .. }
    ));

    broker.delete_topic("doomed").await.unwrap();

    // The connection winds down; the stream ends after an optional close frame.
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None => break,
                Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection did not close after topic delete");
}

#[tokio::test]
async fn test_pubsub_client_smoke() {
    let (broker, url) = start_server(Limits::default()).await;
    broker.create_topic("chat").unwrap();

    let mut client = PubSubClient::connect(&url).await.expect("connect failed");
    client
        .subscribe("chat", "smoke", None)
        .await
        .expect("subscribe failed");

    async fn next(client: &mut PubSubClient) -> Option<ServerEnvelope> {
        tokio::time::timeout(Duration::from_secs(2), client.next_envelope())
            .await
            .expect("timed out waiting for envelope")
            .expect("read failed")
    }

    assert!(matches!(
        next(&mut client).await,
        Some(ServerEnvelope::Ack { .. })
    ));

    client
        .publish("chat", json!({"text": "hello"}))
        .await
        .expect("publish failed");

    // Ack and event both arrive on this connection; order may interleave.
    let mut saw_event = false;
    for _ in 0..2 {
        match next(&mut client).await {
            Some(ServerEnvelope::Event { message, .. }) => {
                assert_eq!(message.payload, json!({"text": "hello"}));
                saw_event = true;
            }
            Some(ServerEnvelope::Ack { .. }) => {}
            other => panic!("unexpected envelope {other:?}"),
        }
    }
    assert!(saw_event);
}
