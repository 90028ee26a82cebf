//! CLI for hubsub.
//!
//! Subcommands:
//! - `server`: run the broker (WebSocket sessions + management API)
//! - `client`: run a smoke-test client against a running broker

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use hubsub_broker::engine::{Broker, Limits};
use hubsub_client::PubSubClient;
use hubsub_config::load_config;
use hubsub_transport::server;

#[derive(Parser)]
#[command(name = "hubsub")]
enum Command {
    /// Start the broker
    Server,
    /// Run a smoke client: subscribe to a topic, publish one message, and
    /// print the envelopes that come back. The topic must already exist.
    Client {
        /// WebSocket URL of the broker
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,
        /// Topic to subscribe and publish to
        #[arg(long, default_value = "smoke")]
        topic: String,
    },
}

#[tokio::main]
async fn main() {
    hubsub_utils::logging::init("info");

    match Command::parse() {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("server failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { url, topic } => {
            if let Err(e) = run_client(&url, &topic).await {
                error!("client failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let broker = Arc::new(Broker::new(Limits {
        max_topics: config.broker.max_topics,
        max_subscribers_per_topic: config.broker.max_subscribers_per_topic,
        topic_history_size: config.broker.topic_history_size,
        subscriber_queue_size: config.broker.subscriber_queue_size,
    }));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tokio::select! {
        result = server::serve(listener, broker.clone()) => {
            result?;
            error!("server exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining topics");
            broker.shutdown().await;
        }
    }

    Ok(())
}

async fn run_client(url: &str, topic: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut client = PubSubClient::connect(url)
        .await
        .map_err(|e| format!("connect to {url}: {e}"))?;

    client.subscribe(topic, "smoke-cli", Some(5)).await?;
    client
        .publish(topic, json!({"greeting": "hello from hubsub"}))
        .await?;

    // Print the envelopes the round generates, stopping once the
    // connection goes quiet.
    loop {
        match tokio::time::timeout(std::time::Duration::from_secs(2), client.next_envelope()).await
        {
            Ok(Ok(Some(envelope))) => println!("{}", serde_json::to_string(&envelope)?),
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => break,
        }
    }

    Ok(())
}
