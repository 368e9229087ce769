use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Headers},
    producer::{FutureProducer, FutureRecord, Producer},
};
use tracing::{debug, info, warn};

use crate::{
    broker::{MessageSource, Publisher, SourceConnector},
    clients::health::BrokerCheck,
    config::Config,
    error::{BrokerError, PublishError},
    models::message::{EVENT_TYPE_HEADER, InboundMessage},
};

/// Fetches cluster metadata once to prove at least one broker answers.
pub async fn check_connectivity(brokers: &[String], timeout: Duration) -> Result<usize, BrokerError> {
    let bootstrap = bootstrap_servers(brokers)?;

    info!(brokers = %bootstrap, "Checking Kafka connectivity");

    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", &bootstrap)
        .create()
        .map_err(|e| BrokerError::Unreachable {
            brokers: bootstrap.clone(),
            reason: e.to_string(),
        })?;

    let broker_count = tokio::task::spawn_blocking(move || {
        consumer
            .fetch_metadata(None, timeout)
            .map(|metadata| metadata.brokers().len())
    })
    .await
    .map_err(|e| BrokerError::Unreachable {
        brokers: bootstrap.clone(),
        reason: e.to_string(),
    })?
    .map_err(|e| BrokerError::Unreachable {
        brokers: bootstrap.clone(),
        reason: e.to_string(),
    })?;

    info!(brokers = %bootstrap, broker_count, "Kafka connectivity confirmed");

    Ok(broker_count)
}

fn bootstrap_servers(brokers: &[String]) -> Result<String, BrokerError> {
    let brokers: Vec<&str> = brokers
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect();

    if brokers.is_empty() {
        return Err(BrokerError::NoBrokers);
    }

    Ok(brokers.join(","))
}

/// Connectivity check reused by the health endpoint.
pub struct KafkaBrokerCheck {
    brokers: Vec<String>,
    timeout: Duration,
}

impl KafkaBrokerCheck {
    pub fn new(config: &Config) -> Self {
        Self {
            brokers: config.kafka_brokers.clone(),
            timeout: config.broker_check_timeout(),
        }
    }
}

#[async_trait]
impl BrokerCheck for KafkaBrokerCheck {
    async fn check(&self) -> Result<usize, BrokerError> {
        check_connectivity(&self.brokers, self.timeout).await
    }
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
    closed: AtomicBool,
}

impl KafkaPublisher {
    pub fn connect(config: &Config) -> Result<Self, PublishError> {
        let bootstrap = bootstrap_servers(&config.kafka_brokers)
            .map_err(|e| PublishError::Producer(e.to_string()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap)
            .set("client.id", &config.kafka_client_id)
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .create()
            .map_err(|e| PublishError::Producer(e.to_string()))?;

        info!(
            brokers = %bootstrap,
            topic = %config.kafka_producer_topic,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.kafka_producer_topic.clone(),
            timeout: config.publish_timeout(),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn send(&self, key: &[u8], value: &[u8]) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }

        let record = FutureRecord::to(&self.topic).key(key).payload(value);

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(e, _)| PublishError::Send {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;

        debug!(topic = %self.topic, "Message delivered to Kafka");

        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let producer = self.producer.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))?
            .map_err(|e| PublishError::Flush(e.to_string()))?;

        info!(topic = %self.topic, "Kafka producer flushed and closed");

        Ok(())
    }
}

/// Builds one group member per worker against the inbound topic.
pub struct KafkaConnector {
    bootstrap: String,
    topic: String,
    group_id: String,
    client_id: String,
    auto_offset_reset: String,
}

impl KafkaConnector {
    pub fn new(config: &Config) -> Result<Self, BrokerError> {
        Ok(Self {
            bootstrap: bootstrap_servers(&config.kafka_brokers)?,
            topic: config.kafka_topic.clone(),
            group_id: config.kafka_group_id.clone(),
            client_id: config.kafka_client_id.clone(),
            auto_offset_reset: config.kafka_auto_offset_reset.clone(),
        })
    }
}

impl SourceConnector for KafkaConnector {
    type Source = KafkaSource;

    fn connect(&self, worker_id: usize) -> Result<KafkaSource, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap)
            .set("group.id", &self.group_id)
            .set("client.id", format!("{}-{}", self.client_id, worker_id))
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .create()
            .map_err(|e| BrokerError::Consumer(e.to_string()))?;

        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| BrokerError::Consumer(e.to_string()))?;

        info!(
            worker_id,
            topic = %self.topic,
            group_id = %self.group_id,
            "Kafka consumer subscribed"
        );

        Ok(KafkaSource {
            consumer,
            worker_id,
        })
    }
}

pub struct KafkaSource {
    consumer: StreamConsumer,
    worker_id: usize,
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn recv(&mut self) -> Result<InboundMessage, BrokerError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| BrokerError::Receive(e.to_string()))?;

        Ok(to_inbound(&message))
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        let commit_error = |reason: String| BrokerError::Commit {
            partition: message.partition,
            offset: message.offset,
            reason,
        };

        let mut positions = TopicPartitionList::new();
        positions
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| commit_error(e.to_string()))?;

        self.consumer
            .commit(&positions, CommitMode::Async)
            .map_err(|e| commit_error(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.consumer.unsubscribe();
        info!(worker_id = self.worker_id, "Kafka consumer unsubscribed");
        Ok(())
    }
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    let event_type_header = message.headers().and_then(|headers| {
        headers
            .iter()
            .find(|header| header.key == EVENT_TYPE_HEADER)
            .and_then(|header| header.value)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    });

    if message.payload().is_none() {
        warn!(
            partition = message.partition(),
            offset = message.offset(),
            "Received record without a payload"
        );
    }

    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| k.to_vec()),
        payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
        event_type_header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_joins_trimmed_brokers() {
        let brokers = vec!["kafka-1:9092".to_string(), " kafka-2:9092 ".to_string()];

        assert_eq!(
            bootstrap_servers(&brokers).unwrap(),
            "kafka-1:9092,kafka-2:9092"
        );
    }

    #[test]
    fn bootstrap_requires_a_broker() {
        let brokers = vec!["".to_string(), "  ".to_string()];

        assert!(matches!(
            bootstrap_servers(&brokers),
            Err(BrokerError::NoBrokers)
        ));
        assert!(matches!(bootstrap_servers(&[]), Err(BrokerError::NoBrokers)));
    }
}
