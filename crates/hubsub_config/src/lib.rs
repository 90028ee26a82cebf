//! hubsub_config
//!
//! Configuration loading: an optional `config/default` file layered under
//! process environment variables, with per-field defaults. The supported
//! environment variables are `HOST`, `PORT`, `MAX_TOPICS`,
//! `MAX_SUBSCRIBERS_PER_TOPIC`, `TOPIC_HISTORY_SIZE`, and
//! `SUBSCRIBER_QUEUE_SIZE`.

pub mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, PartialSettings, ServerSettings, Settings};

pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default());

    let partial: PartialSettings = builder.build()?.try_deserialize()?;
    Ok(Settings::from_partial(partial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.broker.max_topics, 100);
        assert_eq!(settings.broker.max_subscribers_per_topic, 100);
        assert_eq!(settings.broker.topic_history_size, 100);
        assert_eq!(settings.broker.subscriber_queue_size, 100);
    }

    #[test]
    fn partial_overrides_fold_over_defaults() {
        let settings = Settings::from_partial(PartialSettings {
            port: Some(9000),
            subscriber_queue_size: Some(2),
            ..PartialSettings::default()
        });
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.broker.subscriber_queue_size, 2);
        assert_eq!(settings.broker.topic_history_size, 100);
    }

    #[test]
    fn empty_partial_is_the_default() {
        assert_eq!(
            Settings::from_partial(PartialSettings::default()),
            Settings::default()
        );
    }
}
