//! Seams between the pipeline and the message broker.
//!
//! The outbound side is shared by every worker, so [`Publisher`] takes `&self`.
//! The inbound side is one [`MessageSource`] per worker, created through a
//! [`SourceConnector`] so each worker owns its own consumer handle.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{BrokerError, PublishError},
    models::message::InboundMessage,
};

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers one keyed message to the outbound topic.
    async fn send(&self, key: &[u8], value: &[u8]) -> Result<(), PublishError>;

    /// Flushes pending deliveries and releases the connection.
    async fn close(&self) -> Result<(), PublishError>;
}

#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message. Must be safe to drop mid-wait.
    async fn recv(&mut self) -> Result<InboundMessage, BrokerError>;

    /// Acknowledges `message` so the group resumes after it.
    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError>;
}

pub trait SourceConnector: Send + Sync {
    type Source: MessageSource + 'static;

    fn connect(&self, worker_id: usize) -> Result<Self::Source, BrokerError>;
}

impl<T: SourceConnector> SourceConnector for Arc<T> {
    type Source = T::Source;

    fn connect(&self, worker_id: usize) -> Result<Self::Source, BrokerError> {
        self.as_ref().connect(worker_id)
    }
}
