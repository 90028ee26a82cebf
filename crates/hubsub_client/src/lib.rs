//! hubsub_client
//!
//! Minimal connecting client for the broker's WebSocket protocol.

pub mod pubsub_client;

pub use pubsub_client::{ClientError, PubSubClient};
