//! Transport sink abstraction.
//!
//! A sink is the write half of one client connection. Sessions, heartbeat
//! tasks, delivery loops, and slow-consumer eviction all write through the
//! same handle, so implementations must serialize their writes internally.
//! The trait exists so the core and its tests can run against an in-memory
//! sink instead of a network socket.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::error::{BrokerError, Result};
use crate::protocol::ServerEnvelope;

#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    /// Write one envelope. Returns an error once the sink is closed or the
    /// underlying transport fails; callers treat that as terminal.
    async fn write_envelope(&self, env: &ServerEnvelope) -> Result<()>;

    /// Close the underlying transport. Must be idempotent.
    async fn close(&self);
}

/// In-memory sink that records every envelope written to it.
///
/// [`MemorySink::gated`] builds a sink whose writes park until a permit is
/// released, which is how tests stall a consumer without a real socket.
#[derive(Default)]
pub struct MemorySink {
    written: Mutex<Vec<ServerEnvelope>>,
    closed: AtomicBool,
    gate: Option<Semaphore>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that consumes one gate permit per write. With no permits
    /// available, writers park until [`MemorySink::release`] is called or
    /// the sink is closed.
    pub fn gated() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            gate: Some(Semaphore::new(0)),
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub async fn written(&self) -> Vec<ServerEnvelope> {
        self.written.lock().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvelopeSink for MemorySink {
    async fn write_envelope(&self, env: &ServerEnvelope) -> Result<()> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| BrokerError::SinkClosed)?;
            permit.forget();
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::SinkClosed);
        }
        self.written.lock().await.push(env.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }
}
