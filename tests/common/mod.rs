use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use notification_orchestrator::{
    broker::{MessageSource, SourceConnector},
    clients::memory::{MemoryBroker, MemoryPublisher},
    error::BrokerError,
    handlers::register_all,
    models::{message::InboundMessage, notification::NotificationMessage},
    pool::ConsumerPool,
    processor::EventProcessor,
    registry::EventRegistry,
    service::NotificationService,
};
use serde_json::{Value, json};

pub const TOPIC: &str = "user-events";
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn build_processor(publisher: Arc<MemoryPublisher>) -> Arc<EventProcessor> {
    let service = Arc::new(NotificationService::new(publisher));
    let mut registry = EventRegistry::new();
    register_all(&mut registry, service).unwrap();
    Arc::new(EventProcessor::new(Arc::new(registry)))
}

pub struct Harness {
    pub broker: Arc<MemoryBroker>,
    pub publisher: Arc<MemoryPublisher>,
    pub pool: ConsumerPool<Arc<MemoryBroker>>,
}

impl Harness {
    pub fn start(workers: usize, publisher: MemoryPublisher, grace: Duration) -> Self {
        let broker = Arc::new(MemoryBroker::new(TOPIC, workers));
        let publisher = Arc::new(publisher);
        let processor = build_processor(Arc::clone(&publisher));

        let mut pool = ConsumerPool::new(Arc::clone(&broker), processor, grace);
        pool.start(workers).unwrap();

        Self {
            broker,
            publisher,
            pool,
        }
    }

    pub fn send(&self, key: &str, event_type: &str, payload: Value) -> usize {
        self.broker
            .publish(Some(key.as_bytes()), envelope(event_type, payload))
    }

    pub fn send_raw(&self, key: &str, raw: &[u8]) -> usize {
        self.broker.publish(Some(key.as_bytes()), raw.to_vec())
    }
}

pub fn envelope(event_type: &str, payload: Value) -> Vec<u8> {
    json!({"eventType": event_type, "payload": payload})
        .to_string()
        .into_bytes()
}

pub fn registration(id: i64, email: &str, name: &str, phone: &str) -> Value {
    json!({"id": id, "email": email, "name": name, "phone": phone})
}

pub fn decode(publisher: &MemoryPublisher) -> Vec<(String, NotificationMessage)> {
    publisher
        .records()
        .into_iter()
        .map(|record| {
            (
                String::from_utf8(record.key).unwrap(),
                serde_json::from_slice(&record.value).unwrap(),
            )
        })
        .collect()
}

/// Polls until `condition` holds or the wait times out.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT_TIMEOUT {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Connector whose sources never yield a message and can be told to fail.
pub struct FaultyConnector {
    pub panic_worker: Option<usize>,
    pub fail_close: bool,
}

impl SourceConnector for FaultyConnector {
    type Source = FaultySource;

    fn connect(&self, worker_id: usize) -> Result<FaultySource, BrokerError> {
        Ok(FaultySource {
            panic_on_recv: self.panic_worker == Some(worker_id),
            fail_close: self.fail_close,
        })
    }
}

pub struct FaultySource {
    panic_on_recv: bool,
    fail_close: bool,
}

#[async_trait]
impl MessageSource for FaultySource {
    async fn recv(&mut self) -> Result<InboundMessage, BrokerError> {
        if self.panic_on_recv {
            panic!("consumer handle poisoned");
        }

        std::future::pending::<Result<InboundMessage, BrokerError>>().await
    }

    async fn commit(&mut self, _message: &InboundMessage) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.fail_close {
            return Err(BrokerError::Consumer("unsubscribe failed".to_string()));
        }

        Ok(())
    }
}
