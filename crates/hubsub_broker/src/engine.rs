//! Broker engine.
//!
//! The `Broker` is the registry of topics: it admits or denies creation
//! and deletion against the configured caps, hands out topic handles, and
//! answers the introspection queries behind the management facade. One
//! instance is created at startup and shared behind an `Arc`; tests build
//! their own instances.
//!
//! Locking: the registry lives under a reader/writer lock that is never
//! held across an await. Deletion removes the topic from the registry
//! first and terminates its subscribers afterwards, so it cannot deadlock
//! with a publish that is already holding the topic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::error::{BrokerError, Result};
use crate::topic::Topic;

/// Capacity limits, sourced from configuration.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_topics: usize,
    pub max_subscribers_per_topic: usize,
    pub topic_history_size: usize,
    pub subscriber_queue_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_topics: 100,
            max_subscribers_per_topic: 100,
            topic_history_size: 100,
            subscriber_queue_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStats {
    pub messages: usize,
    pub subscribers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub uptime_sec: u64,
    pub topics: usize,
    pub subscribers: usize,
}

pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    limits: Limits,
    started_at: Instant,
}

impl Broker {
    pub fn new(limits: Limits) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            limits,
            started_at: Instant::now(),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Install a new empty topic. Fails when the name is taken or the
    /// registry is at capacity.
    pub fn create_topic(&self, name: &str) -> Result<Arc<Topic>> {
        let mut topics = self.topics.write().unwrap();
        if topics.len() >= self.limits.max_topics {
            return Err(BrokerError::MaxTopicsReached);
        }
        if topics.contains_key(name) {
            return Err(BrokerError::TopicExists);
        }
        let topic = Topic::new(
            name,
            self.limits.topic_history_size,
            self.limits.max_subscribers_per_topic,
        );
        topics.insert(name.to_string(), topic.clone());
        info!(topic = %name, "topic created");
        Ok(topic)
    }

    /// Remove a topic and terminate every subscriber it held. Handles
    /// obtained from [`Broker::topic`] before the removal stay usable for
    /// their in-progress operation.
    pub async fn delete_topic(&self, name: &str) -> Result<()> {
        let topic = {
            self.topics
                .write()
                .unwrap()
                .remove(name)
                .ok_or(BrokerError::TopicNotFound)?
        };
        topic.close_all().await;
        info!(topic = %name, "topic deleted");
        Ok(())
    }

    pub fn topic(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.read().unwrap().get(name).cloned()
    }

    /// Snapshot of topic names and subscriber counts.
    pub fn list(&self) -> HashMap<String, usize> {
        self.topics
            .read()
            .unwrap()
            .iter()
            .map(|(name, topic)| (name.clone(), topic.subscriber_count()))
            .collect()
    }

    /// Snapshot of history length and subscriber count per topic.
    pub fn stats(&self) -> HashMap<String, TopicStats> {
        self.topics
            .read()
            .unwrap()
            .iter()
            .map(|(name, topic)| {
                (
                    name.clone(),
                    TopicStats {
                        messages: topic.history_len(),
                        subscribers: topic.subscriber_count(),
                    },
                )
            })
            .collect()
    }

    pub fn health(&self) -> Health {
        let topics = self.topics.read().unwrap();
        let subscribers = topics.values().map(|t| t.subscriber_count()).sum();
        Health {
            uptime_sec: self.started_at.elapsed().as_secs(),
            topics: topics.len(),
            subscribers,
        }
    }

    /// Drain every topic. Called on process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Topic>> = {
            self.topics
                .write()
                .unwrap()
                .drain()
                .map(|(_, topic)| topic)
                .collect()
        };
        for topic in drained {
            topic.close_all().await;
        }
        info!("broker drained");
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
