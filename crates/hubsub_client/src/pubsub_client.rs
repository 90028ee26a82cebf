//! Connecting client.
//!
//! A thin wrapper over one WebSocket connection speaking the broker's JSON
//! protocol. Used by the CLI `client` subcommand for smoke runs and by the
//! end-to-end tests; it is not a full-featured SDK.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hubsub_broker::protocol::ServerEnvelope;

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

pub struct PubSubClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PubSubClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }

    pub async fn subscribe(
        &mut self,
        topic: &str,
        client_id: &str,
        last_n: Option<usize>,
    ) -> Result<(), ClientError> {
        let mut frame = json!({
            "type": "subscribe",
            "topic": topic,
            "client_id": client_id,
        });
        if let Some(n) = last_n {
            frame["last_n"] = json!(n);
        }
        self.send(frame).await
    }

    pub async fn unsubscribe(&mut self, topic: &str, client_id: &str) -> Result<(), ClientError> {
        self.send(json!({
            "type": "unsubscribe",
            "topic": topic,
            "client_id": client_id,
        }))
        .await
    }

    pub async fn publish(&mut self, topic: &str, payload: Value) -> Result<(), ClientError> {
        self.send(json!({
            "type": "publish",
            "topic": topic,
            "message": { "payload": payload },
        }))
        .await
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        self.send(json!({"type": "ping"})).await
    }

    /// Next server envelope, or `None` once the connection is closed.
    pub async fn next_envelope(&mut self) -> Result<Option<ServerEnvelope>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                WsMessage::Text(text) => {
                    return Ok(Some(serde_json::from_str(text.as_str())?));
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send(&mut self, frame: Value) -> Result<(), ClientError> {
        self.stream
            .send(WsMessage::Text(frame.to_string().into()))
            .await?;
        Ok(())
    }
}
