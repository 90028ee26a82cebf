//! Message definitions for the broker.
//!
//! `Message` is the canonical representation of one publication: an `id`
//! that is always a valid UUID after admission, and an opaque JSON payload.
//! The same value is shared by reference between a topic's history ring and
//! every subscriber queue it was fanned out to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{BrokerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: Value,
}

impl Message {
    /// Create a message with a freshly generated v4 id.
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
        }
    }

    /// Admit a client-supplied message: an absent or empty `id` gets a
    /// generated one, anything else must parse as a UUID.
    pub fn admit(id: Option<String>, payload: Value) -> Result<Self> {
        match id {
            None => Ok(Self::new(payload)),
            Some(id) if id.is_empty() => Ok(Self::new(payload)),
            Some(id) => {
                Uuid::parse_str(&id).map_err(|_| BrokerError::InvalidMessageId)?;
                Ok(Self { id, payload })
            }
        }
    }
}
