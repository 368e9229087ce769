use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{ProcessError, RegistryError},
    models::event::{
        DomainEvent, OTP_REQUESTED, PASSWORD_CHANGED, USER_LOGGED_IN, USER_REGISTERED,
    },
    registry::EventRegistry,
    service::NotificationService,
};

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> &'static str;

    fn can_handle(&self, event_type: &str) -> bool {
        self.event_type() == event_type
    }

    async fn handle(&self, event: DomainEvent) -> Result<(), ProcessError>;
}

fn misrouted(handler: &'static str, event: &DomainEvent) -> ProcessError {
    ProcessError::Misrouted {
        handler,
        event_type: event.event_type().to_string(),
    }
}

pub struct UserRegisteredHandler {
    service: Arc<NotificationService>,
}

impl UserRegisteredHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for UserRegisteredHandler {
    fn event_type(&self) -> &'static str {
        USER_REGISTERED
    }

    async fn handle(&self, event: DomainEvent) -> Result<(), ProcessError> {
        match event {
            DomainEvent::UserRegistered(event) => {
                debug!(user_id = event.id, "Handling user registration");
                Ok(self.service.on_user_registered(&event).await?)
            }
            other => Err(misrouted("UserRegisteredHandler", &other)),
        }
    }
}

pub struct UserLoginHandler {
    service: Arc<NotificationService>,
}

impl UserLoginHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for UserLoginHandler {
    fn event_type(&self) -> &'static str {
        USER_LOGGED_IN
    }

    async fn handle(&self, event: DomainEvent) -> Result<(), ProcessError> {
        match event {
            DomainEvent::UserLoggedIn(event) => {
                debug!(user_id = event.id, "Handling user login");
                Ok(self.service.on_user_logged_in(&event).await?)
            }
            other => Err(misrouted("UserLoginHandler", &other)),
        }
    }
}

pub struct PasswordChangedHandler {
    service: Arc<NotificationService>,
}

impl PasswordChangedHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for PasswordChangedHandler {
    fn event_type(&self) -> &'static str {
        PASSWORD_CHANGED
    }

    async fn handle(&self, event: DomainEvent) -> Result<(), ProcessError> {
        match event {
            DomainEvent::PasswordChanged(event) => {
                debug!(user_id = event.id, "Handling password change");
                Ok(self.service.on_password_changed(&event).await?)
            }
            other => Err(misrouted("PasswordChangedHandler", &other)),
        }
    }
}

pub struct OtpRequestedHandler {
    service: Arc<NotificationService>,
}

impl OtpRequestedHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for OtpRequestedHandler {
    fn event_type(&self) -> &'static str {
        OTP_REQUESTED
    }

    async fn handle(&self, event: DomainEvent) -> Result<(), ProcessError> {
        match event {
            DomainEvent::OtpRequested(event) => {
                debug!(user_id = event.id, "Handling OTP request");
                Ok(self.service.on_otp_requested(&event).await?)
            }
            other => Err(misrouted("OtpRequestedHandler", &other)),
        }
    }
}

/// Registers a handler for every account event this service understands.
pub fn register_all(
    registry: &mut EventRegistry,
    service: Arc<NotificationService>,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(UserRegisteredHandler::new(Arc::clone(&service))))?;
    registry.register(Arc::new(UserLoginHandler::new(Arc::clone(&service))))?;
    registry.register(Arc::new(PasswordChangedHandler::new(Arc::clone(&service))))?;
    registry.register(Arc::new(OtpRequestedHandler::new(service)))?;

    Ok(())
}
