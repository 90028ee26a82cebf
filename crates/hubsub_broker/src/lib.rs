//! hubsub_broker
//!
//! The broker crate contains the in-memory pub/sub core: the topic
//! registry, per-topic history rings with replay, subscriber queues with
//! their delivery loops, and the non-blocking fan-out with slow-consumer
//! eviction. Transport crates drive it through [`engine::Broker`] and the
//! [`sink::EnvelopeSink`] seam; nothing in here knows about sockets.

pub mod engine;
pub mod error;
pub mod message;
pub mod protocol;
pub mod sink;
pub mod subscriber;
pub mod topic;

pub use engine::{Broker, Limits};
pub use error::BrokerError;
pub use message::Message;
