use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("No broker address configured")]
    NoBrokers,

    #[error("Broker unreachable at {brokers}: {reason}")]
    Unreachable { brokers: String, reason: String },

    #[error("Failed to create consumer: {0}")]
    Consumer(String),

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to commit offset {offset} on partition {partition}: {reason}")]
    Commit {
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error("Message source closed")]
    Closed,

    #[error("Consumer pool cannot start: {0}")]
    PoolStart(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to publish to topic {topic}: {reason}")]
    Send { topic: String, reason: String },

    #[error("Failed to create producer: {0}")]
    Producer(String),

    #[error("Failed to flush producer: {0}")]
    Flush(String),

    #[error("Publisher is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No {channel} recipient available for user {user_id}")]
    MissingRecipient { channel: String, user_id: i64 },

    #[error("Invalid {channel} recipient for user {user_id}: {reason}")]
    InvalidRecipient {
        channel: String,
        user_id: i64,
        reason: String,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A handler is already registered for event type '{0}'")]
    DuplicateHandler(String),

    #[error("No handler registered for event type '{0}'")]
    HandlerNotFound(String),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("No handler registered for event type '{0}'")]
    HandlerNotFound(String),

    #[error("Handler {handler} cannot handle event type '{event_type}'")]
    Misrouted {
        handler: &'static str,
        event_type: String,
    },

    #[error("Handler failed: {0}")]
    Handler(#[from] NotificationError),

    #[error("Worker fault while handling message: {0}")]
    WorkerFault(String),
}

impl ProcessError {
    /// Messages that can never succeed and are consumed without further action.
    pub fn is_dropped(&self) -> bool {
        matches!(
            self,
            ProcessError::MalformedEvent(_) | ProcessError::HandlerNotFound(_)
        )
    }
}
