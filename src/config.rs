use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub kafka_brokers: Vec<String>,
    #[serde(default = "default_kafka_topic")]
    pub kafka_topic: String,
    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,
    #[serde(default = "default_kafka_producer_topic")]
    pub kafka_producer_topic: String,
    #[serde(default = "default_kafka_client_id")]
    pub kafka_client_id: String,
    #[serde(default = "default_kafka_auto_offset_reset")]
    pub kafka_auto_offset_reset: String,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_broker_check_timeout_ms")]
    pub broker_check_timeout_ms: u64,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_health_cache_ms")]
    pub health_cache_ms: u64,

    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

fn default_kafka_topic() -> String {
    "user-events".to_string()
}

fn default_kafka_group_id() -> String {
    "kafka-listener-group".to_string()
}

fn default_kafka_producer_topic() -> String {
    "notifications".to_string()
}

fn default_kafka_client_id() -> String {
    "notification-orchestrator".to_string()
}

fn default_kafka_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_shutdown_grace_seconds() -> u64 {
    3
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_broker_check_timeout_ms() -> u64 {
    5000
}

fn default_server_port() -> u16 {
    8080
}

fn default_health_cache_ms() -> u64 {
    5000
}

fn default_rust_log() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.kafka_brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(anyhow!("KAFKA_BROKERS must list at least one broker"));
        }

        if self.worker_concurrency == 0 {
            return Err(anyhow!("WORKER_CONCURRENCY must be at least 1"));
        }

        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn broker_check_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_check_timeout_ms)
    }

    pub fn health_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.health_cache_ms)
    }
}
