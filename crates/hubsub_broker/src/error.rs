//! Error types for the broker core.
//!
//! Every failure here is a value the caller maps onto a wire error code or
//! an HTTP status. Nothing in this enum is fatal to the broker itself.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("topic already exists")]
    TopicExists,

    #[error("topic not found")]
    TopicNotFound,

    #[error("maximum topics reached")]
    MaxTopicsReached,

    #[error("maximum subscribers reached for topic")]
    MaxSubscribersReached,

    #[error("client_id already subscribed to topic")]
    SubscriberExists,

    #[error("message.id must be a valid UUID")]
    InvalidMessageId,

    #[error("transport sink closed")]
    SinkClosed,

    #[error("transport write failed: {0}")]
    Transport(String),
}
