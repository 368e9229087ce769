use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{error::RegistryError, handlers::EventHandler};

/// Event-type to handler table. Filled during startup, then shared behind an
/// `Arc` and only read.
#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a second handler for an event type already claimed.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> Result<(), RegistryError> {
        let event_type = handler.event_type();

        if self.handlers.contains_key(event_type) {
            return Err(RegistryError::DuplicateHandler(event_type.to_string()));
        }

        debug!(event_type, "Handler registered");
        self.handlers.insert(event_type.to_string(), handler);

        Ok(())
    }

    pub fn lookup(&self, event_type: &str) -> Result<&dyn EventHandler, RegistryError> {
        self.handlers
            .get(event_type)
            .map(|handler| handler.as_ref())
            .filter(|handler| handler.can_handle(event_type))
            .ok_or_else(|| RegistryError::HandlerNotFound(event_type.to_string()))
    }

    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
