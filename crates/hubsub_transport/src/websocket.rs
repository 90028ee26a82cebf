//! WebSocket session transport.
//!
//! Each accepted connection gets a reader driving the session dispatch, a
//! heartbeat task, and one cancellation token whose children stop every
//! delivery loop the session started. The write half of the socket sits
//! behind [`WsSink`], whose mutex serializes acks, events, errors, and
//! heartbeats onto the wire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use hubsub_broker::error::{BrokerError, Result};
use hubsub_broker::protocol::ServerEnvelope;
use hubsub_broker::sink::EnvelopeSink;

use crate::server::AppState;
use crate::session::{self, Flow};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /ws` upgrade endpoint.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Write half of one WebSocket connection.
struct WsSink {
    writer: Mutex<Option<SplitSink<WebSocket, WsMessage>>>,
}

impl WsSink {
    fn new(writer: SplitSink<WebSocket, WsMessage>) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }
}

#[async_trait]
impl EnvelopeSink for WsSink {
    async fn write_envelope(&self, env: &ServerEnvelope) -> Result<()> {
        let text = serde_json::to_string(env).map_err(|e| BrokerError::Transport(e.to_string()))?;
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer
                .send(WsMessage::Text(text.into()))
                .await
                .map_err(|e| BrokerError::Transport(e.to_string())),
            None => Err(BrokerError::SinkClosed),
        }
    }

    async fn close(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.close().await;
        }
    }
}

async fn run_session(socket: WebSocket, state: AppState) {
    info!("websocket session opened");
    let (writer, mut reader) = socket.split();
    let sink: Arc<dyn EnvelopeSink> = Arc::new(WsSink::new(writer));
    let cancel = CancellationToken::new();

    tokio::spawn(run_heartbeat(sink.clone(), cancel.clone()));

    while let Some(frame) = reader.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "websocket read error");
                break;
            }
        };
        match frame {
            WsMessage::Text(text) => {
                if session::handle_text(&state.broker, &sink, &cancel, text.as_str()).await
                    == Flow::Close
                {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            // Binary frames are not part of the protocol; control frames
            // are answered by the library.
            _ => {}
        }
    }

    cancel.cancel();
    sink.close().await;
    info!("websocket session closed");
}

async fn run_heartbeat(sink: Arc<dyn EnvelopeSink>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately; the first heartbeat should not.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if sink.write_envelope(&ServerEnvelope::heartbeat()).await.is_err() {
                    break;
                }
            }
        }
    }
}
