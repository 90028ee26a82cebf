//! Topic management.
//!
//! A `Topic` is a named fan-out mailbox: a map of live subscribers plus a
//! bounded ring of recent messages for replay. Subscriber map and history
//! live under one `RwLock` that is never held across an await; a separate
//! async mutex serializes publishers so that history order equals enqueue
//! order on every subscriber queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{BrokerError, Result};
use crate::message::Message;
use crate::subscriber::{run_delivery, Enqueue, Subscriber};

pub struct Topic {
    pub name: String,
    history_cap: usize,
    max_subscribers: usize,
    state: RwLock<TopicState>,
    publish_serial: Mutex<()>,
}

#[derive(Default)]
struct TopicState {
    subscribers: HashMap<String, Arc<Subscriber>>,
    history: VecDeque<Message>,
}

impl Topic {
    pub(crate) fn new(
        name: impl Into<String>,
        history_cap: usize,
        max_subscribers: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            history_cap,
            max_subscribers,
            state: RwLock::new(TopicState::default()),
            publish_serial: Mutex::new(()),
        })
    }

    /// Register a subscriber and start its delivery loop. Rejects when the
    /// topic is at capacity or the `client_id` is already registered.
    pub fn subscribe(
        self: &Arc<Self>,
        sub: Arc<Subscriber>,
        rx: mpsc::Receiver<Message>,
    ) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            if state.subscribers.len() >= self.max_subscribers {
                return Err(BrokerError::MaxSubscribersReached);
            }
            if state.subscribers.contains_key(&sub.id) {
                return Err(BrokerError::SubscriberExists);
            }
            state.subscribers.insert(sub.id.clone(), sub.clone());
        }
        debug!(topic = %self.name, client_id = %sub.id, "subscriber registered");
        tokio::spawn(run_delivery(sub, rx, Arc::downgrade(self)));
        Ok(())
    }

    /// Remove and terminate a subscriber. Returns `false` when the
    /// `client_id` was not registered; callers treat that as a no-op.
    pub async fn unsubscribe(&self, client_id: &str) -> bool {
        let sub = { self.state.write().unwrap().subscribers.remove(client_id) };
        match sub {
            Some(sub) => {
                sub.terminate().await;
                debug!(topic = %self.name, client_id = %client_id, "subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Drop a subscriber's registry entry without terminating it. Used by
    /// the delivery loop on exit; compares identity so a later subscriber
    /// reusing the same `client_id` is left alone.
    pub(crate) fn forget(&self, sub: &Arc<Subscriber>) {
        let mut state = self.state.write().unwrap();
        if state
            .subscribers
            .get(&sub.id)
            .is_some_and(|current| Arc::ptr_eq(current, sub))
        {
            state.subscribers.remove(&sub.id);
        }
    }

    /// Append to history and fan out to every live subscriber.
    ///
    /// The publish is committed once the history append is done and every
    /// snapshotted subscriber has been classified: enqueued, skipped
    /// (already tearing down), or evicted as a slow consumer. Eviction
    /// runs in its own task so a stalled sink never blocks peers or the
    /// publisher.
    pub async fn publish(&self, msg: Message) {
        let _serial = self.publish_serial.lock().await;
        let snapshot: Vec<Arc<Subscriber>> = {
            let mut state = self.state.write().unwrap();
            state.history.push_back(msg.clone());
            if state.history.len() > self.history_cap {
                state.history.pop_front();
            }
            state.subscribers.values().cloned().collect()
        };
        for sub in snapshot {
            match sub.try_enqueue(msg.clone()) {
                Enqueue::Ok => {}
                Enqueue::Full => {
                    warn!(topic = %self.name, client_id = %sub.id, "subscriber queue overflow, evicting");
                    self.forget(&sub);
                    tokio::spawn(async move { sub.evict().await });
                }
                Enqueue::Closed => {
                    // Delivery loop is tearing down; it deregisters itself.
                }
            }
        }
    }

    /// The most recent `n` messages in publication order. `n` of zero or
    /// beyond the history length is clamped to the whole history.
    pub fn replay(&self, n: usize) -> Vec<Message> {
        let state = self.state.read().unwrap();
        let len = state.history.len();
        let n = if n == 0 || n > len { len } else { n };
        state.history.iter().skip(len - n).cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().unwrap().subscribers.len()
    }

    pub fn history_len(&self) -> usize {
        self.state.read().unwrap().history.len()
    }

    /// Terminate every subscriber. Called by broker delete and shutdown
    /// after the topic has left the registry.
    pub(crate) async fn close_all(&self) {
        let subs: Vec<Arc<Subscriber>> = {
            let mut state = self.state.write().unwrap();
            state.subscribers.drain().map(|(_, sub)| sub).collect()
        };
        for sub in subs {
            sub.terminate().await;
        }
    }
}
