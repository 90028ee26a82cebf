//! Settings model.
//!
//! `Settings` is what the rest of the system consumes; `PartialSettings`
//! is the flat, all-optional shape collected from the config file and the
//! environment, folded over the defaults field by field.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_topics: usize,
    pub max_subscribers_per_topic: usize,
    pub topic_history_size: usize,
    pub subscriber_queue_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                max_topics: 100,
                max_subscribers_per_topic: 100,
                topic_history_size: 100,
                subscriber_queue_size: 100,
            },
        }
    }
}

/// Flat overrides. Keys match the environment variable names (`PORT`,
/// `MAX_TOPICS`, ...) lowercased, which is how the config crate hands
/// environment values over.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_topics: Option<usize>,
    pub max_subscribers_per_topic: Option<usize>,
    pub topic_history_size: Option<usize>,
    pub subscriber_queue_size: Option<usize>,
}

impl Settings {
    pub fn from_partial(partial: PartialSettings) -> Self {
        let default = Settings::default();
        Settings {
            server: ServerSettings {
                host: partial.host.unwrap_or(default.server.host),
                port: partial.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_topics: partial.max_topics.unwrap_or(default.broker.max_topics),
                max_subscribers_per_topic: partial
                    .max_subscribers_per_topic
                    .unwrap_or(default.broker.max_subscribers_per_topic),
                topic_history_size: partial
                    .topic_history_size
                    .unwrap_or(default.broker.topic_history_size),
                subscriber_queue_size: partial
                    .subscriber_queue_size
                    .unwrap_or(default.broker.subscriber_queue_size),
            },
        }
    }
}
