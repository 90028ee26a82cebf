//! Subscriber lifecycle and delivery.
//!
//! A subscriber owns a bounded queue fed by topic fan-out and drained by
//! exactly one delivery loop, which writes one `event` envelope per message
//! through the shared transport sink. Termination can be initiated by the
//! delivery loop itself (queue closed, write failure), by the topic
//! (unsubscribe, delete, slow-consumer eviction), or by session
//! cancellation; whichever path wins the `live -> terminating` transition
//! owns closing the sink, so the sink is closed exactly once.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::Message;
use crate::protocol::ServerEnvelope;
use crate::sink::EnvelopeSink;
use crate::topic::Topic;

const LIVE: u8 = 0;
const TERMINATING: u8 = 1;
const CLOSED: u8 = 2;

/// Result of a non-blocking enqueue during fan-out.
pub(crate) enum Enqueue {
    Ok,
    Full,
    Closed,
}

/// Delivery endpoint for one `client_id` on one topic.
pub struct Subscriber {
    pub id: String,
    pub topic: String,
    tx: mpsc::Sender<Message>,
    pub(crate) sink: Arc<dyn EnvelopeSink>,
    pub(crate) cancel: CancellationToken,
    state: AtomicU8,
}

impl Subscriber {
    /// Build a subscriber with a queue of capacity `queue_cap`. The
    /// returned receiver is handed to [`Topic::subscribe`], which starts
    /// the delivery loop.
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        sink: Arc<dyn EnvelopeSink>,
        queue_cap: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(queue_cap);
        let sub = Arc::new(Self {
            id: id.into(),
            topic: topic.into(),
            tx,
            sink,
            cancel,
            state: AtomicU8::new(LIVE),
        });
        (sub, rx)
    }

    pub(crate) fn try_enqueue(&self, msg: Message) -> Enqueue {
        match self.tx.try_send(msg) {
            Ok(()) => Enqueue::Ok,
            Err(TrySendError::Full(_)) => Enqueue::Full,
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::SeqCst) == LIVE
    }

    /// Claim responsibility for teardown. Only the first caller gets it.
    fn begin_termination(&self) -> bool {
        self.state
            .compare_exchange(LIVE, TERMINATING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Stop the delivery loop and close the transport. Idempotent.
    pub async fn terminate(&self) {
        if self.begin_termination() {
            self.cancel.cancel();
            self.sink.close().await;
            self.state.store(CLOSED, Ordering::SeqCst);
        }
    }

    /// Slow-consumer teardown: cancel delivery, write the terminal
    /// `SLOW_CONSUMER` error, then close the transport.
    ///
    /// Cancelling first makes the delivery loop drop any in-flight write,
    /// which frees the sink's write serialization for the error envelope.
    pub(crate) async fn evict(&self) {
        if self.begin_termination() {
            self.cancel.cancel();
            let _ = self.sink.write_envelope(&ServerEnvelope::slow_consumer()).await;
            self.sink.close().await;
            self.state.store(CLOSED, Ordering::SeqCst);
        }
    }
}

/// Delivery loop: drain the queue onto the sink until the queue closes,
/// the subscriber is cancelled, or a write fails. On exit the subscriber
/// deregisters itself from its topic (idempotent).
pub(crate) async fn run_delivery(
    sub: Arc<Subscriber>,
    mut rx: mpsc::Receiver<Message>,
    topic: Weak<Topic>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = sub.cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(msg) => msg,
                None => break,
            },
        };
        let env = ServerEnvelope::event(sub.topic.clone(), msg);
        tokio::select! {
            biased;
            _ = sub.cancel.cancelled() => break,
            res = sub.sink.write_envelope(&env) => {
                if let Err(err) = res {
                    debug!(client_id = %sub.id, topic = %sub.topic, error = %err, "delivery write failed");
                    break;
                }
            }
        }
    }
    rx.close();
    sub.terminate().await;
    if let Some(topic) = topic.upgrade() {
        topic.forget(&sub);
    }
}
