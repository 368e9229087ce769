use std::sync::Arc;

use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::{
    error::ProcessError,
    models::{
        event::DomainEvent,
        message::{EventEnvelope, InboundMessage},
    },
    registry::EventRegistry,
};

pub struct EventProcessor {
    registry: Arc<EventRegistry>,
}

impl EventProcessor {
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Decodes one raw record and runs it through its handler.
    ///
    /// `MalformedEvent` and `HandlerNotFound` mean the record can be dropped;
    /// any other error came from the handler and may be transient.
    pub async fn process(&self, message: &InboundMessage) -> Result<(), ProcessError> {
        let span = info_span!(
            "process_message",
            trace_id = %Uuid::new_v4(),
            partition = message.partition,
            offset = message.offset,
        );

        self.process_inner(message).instrument(span).await
    }

    async fn process_inner(&self, message: &InboundMessage) -> Result<(), ProcessError> {
        let envelope = EventEnvelope::from_message(message)?;

        debug!(event_type = %envelope.event_type, "Envelope decoded");

        let handler = self
            .registry
            .lookup(&envelope.event_type)
            .map_err(|_| ProcessError::HandlerNotFound(envelope.event_type.clone()))?;

        let event = DomainEvent::decode(&envelope)?;

        handler.handle(event).await
    }
}
