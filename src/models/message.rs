use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ProcessError;

/// Header carrying the event type when the record value is the bare payload.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// Owned copy of a record pulled from the inbound topic.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub event_type_header: Option<String>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
            event_type_header: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_event_type_header(mut self, event_type: impl Into<String>) -> Self {
        self.event_type_header = Some(event_type.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub payload: JsonValue,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Reads the envelope out of a raw record. A record tagged through the
    /// `event_type` header is taken whole as the payload.
    pub fn from_message(message: &InboundMessage) -> Result<Self, ProcessError> {
        let envelope = match message.event_type_header.as_deref() {
            Some(event_type) => {
                let payload = serde_json::from_slice::<JsonValue>(&message.payload)
                    .map_err(|e| ProcessError::MalformedEvent(format!("invalid payload: {}", e)))?;
                Self::new(event_type, payload)
            }
            None => serde_json::from_slice::<Self>(&message.payload)
                .map_err(|e| ProcessError::MalformedEvent(format!("invalid envelope: {}", e)))?,
        };

        if envelope.event_type.trim().is_empty() {
            return Err(ProcessError::MalformedEvent(
                "eventType cannot be empty".to_string(),
            ));
        }

        Ok(envelope)
    }
}
