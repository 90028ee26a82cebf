//! Session request dispatch.
//!
//! Translates one inbound text frame into broker operations and response
//! envelopes. Kept free of any socket type so the same dispatch runs under
//! the WebSocket driver and against an in-memory sink in tests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use hubsub_broker::engine::Broker;
use hubsub_broker::message::Message;
use hubsub_broker::protocol::{
    ClientEnvelope, PublishBody, ServerEnvelope, CODE_BAD_REQUEST, CODE_INTERNAL,
    CODE_TOPIC_NOT_FOUND,
};
use hubsub_broker::sink::EnvelopeSink;
use hubsub_broker::subscriber::Subscriber;

/// What the read loop should do after a frame has been handled.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    /// The frame was not valid JSON; treat it like a transport read error.
    Close,
}

pub(crate) async fn handle_text(
    broker: &Arc<Broker>,
    sink: &Arc<dyn EnvelopeSink>,
    cancel: &CancellationToken,
    text: &str,
) -> Flow {
    match serde_json::from_str::<ClientEnvelope>(text) {
        Ok(envelope) => {
            handle_envelope(broker, sink, cancel, envelope).await;
            Flow::Continue
        }
        Err(err) => {
            if serde_json::from_str::<serde_json::Value>(text).is_err() {
                debug!(error = %err, "unreadable frame, closing session");
                return Flow::Close;
            }
            send(
                sink,
                ServerEnvelope::error(None, CODE_BAD_REQUEST, "Invalid message type"),
            )
            .await;
            Flow::Continue
        }
    }
}

pub(crate) async fn handle_envelope(
    broker: &Arc<Broker>,
    sink: &Arc<dyn EnvelopeSink>,
    cancel: &CancellationToken,
    envelope: ClientEnvelope,
) {
    match envelope {
        ClientEnvelope::Subscribe {
            topic,
            client_id,
            last_n,
            request_id,
        } => handle_subscribe(broker, sink, cancel, topic, client_id, last_n, request_id).await,
        ClientEnvelope::Unsubscribe {
            topic,
            client_id,
            request_id,
        } => handle_unsubscribe(broker, sink, topic, client_id, request_id).await,
        ClientEnvelope::Publish {
            topic,
            message,
            request_id,
        } => handle_publish(broker, sink, topic, message, request_id).await,
        ClientEnvelope::Ping { request_id } => {
            send(sink, ServerEnvelope::pong(request_id)).await;
        }
    }
}

async fn handle_subscribe(
    broker: &Arc<Broker>,
    sink: &Arc<dyn EnvelopeSink>,
    cancel: &CancellationToken,
    topic: Option<String>,
    client_id: Option<String>,
    last_n: Option<usize>,
    request_id: Option<String>,
) {
    let (Some(topic_name), Some(client_id)) = (non_empty(topic), non_empty(client_id)) else {
        send_error(sink, request_id, CODE_BAD_REQUEST, "Topic and client_id are required").await;
        return;
    };
    let Some(topic) = broker.topic(&topic_name) else {
        send_error(sink, request_id, CODE_TOPIC_NOT_FOUND, "Topic does not exist").await;
        return;
    };

    let (sub, rx) = Subscriber::new(
        client_id,
        topic_name.clone(),
        sink.clone(),
        broker.limits().subscriber_queue_size,
        cancel.child_token(),
    );
    if let Err(err) = topic.subscribe(sub, rx) {
        send_error(sink, request_id, CODE_INTERNAL, err.to_string()).await;
        return;
    }

    send(sink, ServerEnvelope::ack(request_id, topic_name.clone())).await;

    // Replay after the ack. A publish that lands between registration and
    // this drain may show up both here and on the live stream.
    if let Some(n) = last_n {
        if n > 0 {
            for msg in topic.replay(n) {
                if sink
                    .write_envelope(&ServerEnvelope::event(topic_name.clone(), msg))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

async fn handle_unsubscribe(
    broker: &Arc<Broker>,
    sink: &Arc<dyn EnvelopeSink>,
    topic: Option<String>,
    client_id: Option<String>,
    request_id: Option<String>,
) {
    let (Some(topic_name), Some(client_id)) = (non_empty(topic), non_empty(client_id)) else {
        send_error(sink, request_id, CODE_BAD_REQUEST, "Topic and client_id are required").await;
        return;
    };
    let Some(topic) = broker.topic(&topic_name) else {
        send_error(sink, request_id, CODE_TOPIC_NOT_FOUND, "Topic does not exist").await;
        return;
    };

    // Ack first: removing the subscriber also closes its transport, and
    // the ack has to reach the client before that.
    send(sink, ServerEnvelope::ack(request_id, topic_name)).await;
    topic.unsubscribe(&client_id).await;
}

async fn handle_publish(
    broker: &Arc<Broker>,
    sink: &Arc<dyn EnvelopeSink>,
    topic: Option<String>,
    message: Option<PublishBody>,
    request_id: Option<String>,
) {
    let (Some(topic_name), Some(body)) = (non_empty(topic), message) else {
        send_error(sink, request_id, CODE_BAD_REQUEST, "Topic and message are required").await;
        return;
    };
    let msg = match Message::admit(body.id, body.payload) {
        Ok(msg) => msg,
        Err(err) => {
            send_error(sink, request_id, CODE_BAD_REQUEST, err.to_string()).await;
            return;
        }
    };
    let Some(topic) = broker.topic(&topic_name) else {
        send_error(sink, request_id, CODE_TOPIC_NOT_FOUND, "Topic does not exist").await;
        return;
    };

    topic.publish(msg).await;
    send(sink, ServerEnvelope::ack(request_id, topic_name)).await;
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn send(sink: &Arc<dyn EnvelopeSink>, env: ServerEnvelope) {
    // A failed response write means the transport is going away; the read
    // loop will notice on its next frame.
    let _ = sink.write_envelope(&env).await;
}

async fn send_error(
    sink: &Arc<dyn EnvelopeSink>,
    request_id: Option<String>,
    code: &str,
    message: impl Into<String>,
) {
    send(sink, ServerEnvelope::error(request_id, code, message)).await;
}
