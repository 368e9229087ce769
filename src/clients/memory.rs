//! In-process broker for tests and local runs.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    broker::{MessageSource, Publisher, SourceConnector},
    error::{BrokerError, PublishError},
    models::message::InboundMessage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffset {
    pub partition: i32,
    pub offset: i64,
}

/// Partitioned inbound topic. Keyed records always land on the same
/// partition, and worker `n` consumes partition `n`.
pub struct MemoryBroker {
    topic: String,
    senders: Mutex<Vec<Option<UnboundedSender<InboundMessage>>>>,
    receivers: Mutex<Vec<Option<UnboundedReceiver<InboundMessage>>>>,
    next_offsets: Vec<AtomicI64>,
    round_robin: AtomicUsize,
    committed: Arc<Mutex<Vec<CommittedOffset>>>,
}

impl MemoryBroker {
    pub fn new(topic: impl Into<String>, partitions: usize) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions.max(1))
            .map(|_| {
                let (tx, rx) = unbounded_channel();
                (Some(tx), Some(rx))
            })
            .unzip();

        Self {
            topic: topic.into(),
            senders: Mutex::new(senders),
            receivers: Mutex::new(receivers),
            next_offsets: (0..partitions.max(1)).map(|_| AtomicI64::new(0)).collect(),
            round_robin: AtomicUsize::new(0),
            committed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn partitions(&self) -> usize {
        self.next_offsets.len()
    }

    pub fn partition_for(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions() as u64) as usize
    }

    /// Appends a record and returns the partition it landed on.
    pub fn publish(&self, key: Option<&[u8]>, payload: impl Into<Vec<u8>>) -> usize {
        let partition = match key {
            Some(key) => self.partition_for(key),
            None => self.round_robin.fetch_add(1, Ordering::SeqCst) % self.partitions(),
        };

        self.publish_to(partition, key, payload, None);
        partition
    }

    pub fn publish_with_header(&self, key: &[u8], event_type: &str, payload: impl Into<Vec<u8>>) {
        let partition = self.partition_for(key);
        self.publish_to(partition, Some(key), payload, Some(event_type));
    }

    fn publish_to(
        &self,
        partition: usize,
        key: Option<&[u8]>,
        payload: impl Into<Vec<u8>>,
        event_type: Option<&str>,
    ) {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);

        // Offsets are taken under the lock so they enqueue in order.
        let offset = self.next_offsets[partition].fetch_add(1, Ordering::SeqCst);

        let mut message =
            InboundMessage::new(self.topic.clone(), partition as i32, offset, payload.into());
        message.key = key.map(<[u8]>::to_vec);
        message.event_type_header = event_type.map(str::to_string);

        if let Some(sender) = &senders[partition] {
            // A receiver dropped by a stopped worker simply discards the record.
            let _ = sender.send(message);
        }
    }

    /// Ends every partition stream; workers see [`BrokerError::Closed`].
    pub fn shutdown(&self) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.iter_mut().for_each(|sender| *sender = None);
    }

    pub fn committed(&self) -> Vec<CommittedOffset> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SourceConnector for MemoryBroker {
    type Source = MemorySource;

    fn connect(&self, worker_id: usize) -> Result<MemorySource, BrokerError> {
        let mut receivers = self.receivers.lock().unwrap_or_else(PoisonError::into_inner);

        let receiver = receivers
            .get_mut(worker_id)
            .and_then(Option::take)
            .ok_or_else(|| {
                BrokerError::Consumer(format!("no free partition for worker {}", worker_id))
            })?;

        Ok(MemorySource {
            receiver,
            committed: Arc::clone(&self.committed),
        })
    }
}

pub struct MemorySource {
    receiver: UnboundedReceiver<InboundMessage>,
    committed: Arc<Mutex<Vec<CommittedOffset>>>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self) -> Result<InboundMessage, BrokerError> {
        self.receiver.recv().await.ok_or(BrokerError::Closed)
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommittedOffset {
                partition: message.partition,
                offset: message.offset,
            });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.receiver.close();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Publisher that captures outbound records.
pub struct MemoryPublisher {
    records: Mutex<Vec<PublishedRecord>>,
    should_fail: AtomicBool,
    delay: Option<Duration>,
    closed: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
            delay: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let publisher = Self::new();
        publisher.set_failing(true);
        publisher
    }

    /// Every send waits `delay` before it is recorded.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<PublishedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn send(&self, key: &[u8], value: &[u8]) -> Result<(), PublishError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(PublishError::Send {
                topic: "memory".to_string(),
                reason: "broker write timeout".to_string(),
            });
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedRecord {
                key: key.to_vec(),
                value: value.to_vec(),
            });

        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
