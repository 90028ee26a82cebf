//! Wire protocol envelopes.
//!
//! JSON envelopes exchanged over a session transport, tagged by `type`.
//! Incoming envelopes keep their fields optional so the session can report
//! a precise `BAD_REQUEST` instead of failing inside serde. These shapes
//! live in the broker crate because the core itself emits envelopes
//! (events from delivery loops, the terminal slow-consumer error) through
//! the [`EnvelopeSink`](crate::sink::EnvelopeSink) seam.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";
pub const CODE_TOPIC_NOT_FOUND: &str = "TOPIC_NOT_FOUND";
pub const CODE_SLOW_CONSUMER: &str = "SLOW_CONSUMER";
pub const CODE_INTERNAL: &str = "INTERNAL";

/// RFC 3339 UTC timestamp carried on every server envelope.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Request envelope sent by a client over the session transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEnvelope {
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_n: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(rename = "publish")]
    Publish {
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<PublishBody>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

/// Body of a publish request. The `id` is optional; the payload defaults
/// to JSON null when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Response envelope written to a session transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEnvelope {
    #[serde(rename = "ack")]
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        topic: String,
        status: String,
        ts: String,
    },
    #[serde(rename = "event")]
    Event {
        topic: String,
        message: Message,
        ts: String,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: ErrorBody,
        ts: String,
    },
    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        ts: String,
    },
    #[serde(rename = "info")]
    Info { msg: String, ts: String },
}

impl ServerEnvelope {
    pub fn ack(request_id: Option<String>, topic: impl Into<String>) -> Self {
        Self::Ack {
            request_id,
            topic: topic.into(),
            status: "ok".to_string(),
            ts: timestamp(),
        }
    }

    pub fn event(topic: impl Into<String>, message: Message) -> Self {
        Self::Event {
            topic: topic.into(),
            message,
            ts: timestamp(),
        }
    }

    pub fn error(request_id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            request_id,
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
            ts: timestamp(),
        }
    }

    pub fn pong(request_id: Option<String>) -> Self {
        Self::Pong {
            request_id,
            ts: timestamp(),
        }
    }

    /// The periodic heartbeat written by each session.
    pub fn heartbeat() -> Self {
        Self::Info {
            msg: "ping".to_string(),
            ts: timestamp(),
        }
    }

    /// Terminal error written to an evicted subscriber.
    pub fn slow_consumer() -> Self {
        Self::error(None, CODE_SLOW_CONSUMER, "Subscriber queue overflow")
    }
}
