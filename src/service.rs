use std::{collections::HashMap, sync::Arc};

use tracing::{error, info};

use crate::{
    broker::Publisher,
    error::NotificationError,
    models::{
        event::{OtpRequested, PasswordChanged, UserLoggedIn, UserRegistered},
        notification::{
            Channel, NotificationMessage, TEMPLATE_LOGIN_NOTIFICATION, TEMPLATE_OTP_VERIFICATION,
            TEMPLATE_PASSWORD_RECOVERY, TEMPLATE_VALIDATE_ACCOUNT,
        },
        validation::validate_phone,
    },
};

/// Turns account events into notification requests on the outbound topic.
/// Every operation makes exactly one publish attempt.
pub struct NotificationService {
    publisher: Arc<dyn Publisher>,
}

impl NotificationService {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    pub async fn on_user_registered(&self, event: &UserRegistered) -> Result<(), NotificationError> {
        let request = NotificationRequest {
            user_id: event.id,
            email: &event.email,
            phone: Some(event.phone.as_str()),
            name: &event.name,
            channel: Channel::Email,
            template: TEMPLATE_VALIDATE_ACCOUNT,
            extra: &[],
        };

        self.dispatch(request.build()?).await
    }

    pub async fn on_user_logged_in(&self, event: &UserLoggedIn) -> Result<(), NotificationError> {
        let request = NotificationRequest {
            user_id: event.id,
            email: &event.email,
            phone: event.phone.as_deref(),
            name: &event.name,
            channel: event.channel.unwrap_or(Channel::Email),
            template: TEMPLATE_LOGIN_NOTIFICATION,
            extra: &[],
        };

        self.dispatch(request.build()?).await
    }

    pub async fn on_password_changed(
        &self,
        event: &PasswordChanged,
    ) -> Result<(), NotificationError> {
        let request = NotificationRequest {
            user_id: event.id,
            email: &event.email,
            phone: event.phone.as_deref(),
            name: &event.name,
            channel: event.channel.unwrap_or(Channel::Email),
            template: TEMPLATE_PASSWORD_RECOVERY,
            extra: &[],
        };

        self.dispatch(request.build()?).await
    }

    pub async fn on_otp_requested(&self, event: &OtpRequested) -> Result<(), NotificationError> {
        let request = NotificationRequest {
            user_id: event.id,
            email: &event.email,
            phone: None,
            name: &event.name,
            channel: Channel::Email,
            template: TEMPLATE_OTP_VERIFICATION,
            extra: &[("url", event.url.as_str())],
        };

        self.dispatch(request.build()?).await
    }

    async fn dispatch(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        let payload = serde_json::to_vec(&message)?;

        if let Err(e) = self
            .publisher
            .send(message.recipient.as_bytes(), &payload)
            .await
        {
            error!(
                error = %e,
                user_id = message.user_id,
                recipient = %message.recipient,
                template = %message.template,
                "Failed to publish notification"
            );
            return Err(e.into());
        }

        info!(
            user_id = message.user_id,
            recipient = %message.recipient,
            channel = %message.channel,
            template = %message.template,
            "Notification event published"
        );

        Ok(())
    }
}

struct NotificationRequest<'a> {
    user_id: i64,
    email: &'a str,
    phone: Option<&'a str>,
    name: &'a str,
    channel: Channel,
    template: &'static str,
    extra: &'a [(&'static str, &'a str)],
}

impl NotificationRequest<'_> {
    fn build(self) -> Result<NotificationMessage, NotificationError> {
        let recipient = match self.channel {
            Channel::Email => self.email,
            Channel::Sms => {
                let phone = self.phone.ok_or_else(|| NotificationError::MissingRecipient {
                    channel: self.channel.to_string(),
                    user_id: self.user_id,
                })?;

                validate_phone(phone).map_err(|e| NotificationError::InvalidRecipient {
                    channel: self.channel.to_string(),
                    user_id: self.user_id,
                    reason: e.to_string(),
                })?;

                phone
            }
        };

        let mut data = HashMap::from([
            ("name".to_string(), self.name.to_string()),
            ("id".to_string(), self.user_id.to_string()),
        ]);
        data.extend(
            self.extra
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );

        Ok(NotificationMessage {
            user_id: self.user_id,
            email: self.email.to_string(),
            phone: self.phone.map(str::to_string),
            name: self.name.to_string(),
            channel: self.channel,
            template: self.template.to_string(),
            recipient: recipient.to_string(),
            data,
        })
    }
}
