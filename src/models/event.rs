use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::ProcessError,
    models::{
        message::EventEnvelope,
        notification::Channel,
        validation::validate_email,
    },
};

pub const USER_REGISTERED: &str = "UserRegistered";
pub const USER_LOGGED_IN: &str = "UserLoggedIn";
pub const PASSWORD_CHANGED: &str = "PasswordChanged";
pub const OTP_REQUESTED: &str = "OtpRequested";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserRegistered {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserLoggedIn {
    pub id: i64,
    pub email: String,
    pub name: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PasswordChanged {
    pub id: i64,
    pub email: String,
    pub name: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OtpRequested {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    UserRegistered(UserRegistered),
    UserLoggedIn(UserLoggedIn),
    PasswordChanged(PasswordChanged),
    OtpRequested(OtpRequested),
}

impl DomainEvent {
    /// Decodes the envelope payload against the schema of its declared type.
    pub fn decode(envelope: &EventEnvelope) -> Result<Self, ProcessError> {
        let event = match envelope.event_type.as_str() {
            USER_REGISTERED => Self::UserRegistered(decode_payload(envelope)?),
            USER_LOGGED_IN => Self::UserLoggedIn(decode_payload(envelope)?),
            PASSWORD_CHANGED => Self::PasswordChanged(decode_payload(envelope)?),
            OTP_REQUESTED => Self::OtpRequested(decode_payload(envelope)?),
            other => return Err(ProcessError::HandlerNotFound(other.to_string())),
        };

        event.validate()?;

        Ok(event)
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserRegistered(_) => USER_REGISTERED,
            Self::UserLoggedIn(_) => USER_LOGGED_IN,
            Self::PasswordChanged(_) => PASSWORD_CHANGED,
            Self::OtpRequested(_) => OTP_REQUESTED,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            Self::UserRegistered(e) => e.id,
            Self::UserLoggedIn(e) => e.id,
            Self::PasswordChanged(e) => e.id,
            Self::OtpRequested(e) => e.id,
        }
    }

    fn validate(&self) -> Result<(), ProcessError> {
        let email = match self {
            Self::UserRegistered(e) => &e.email,
            Self::UserLoggedIn(e) => &e.email,
            Self::PasswordChanged(e) => &e.email,
            Self::OtpRequested(e) => &e.email,
        };

        validate_email(email)
            .map_err(|e| ProcessError::MalformedEvent(format!("{}: {}", self.event_type(), e)))
    }
}

fn decode_payload<T: DeserializeOwned>(envelope: &EventEnvelope) -> Result<T, ProcessError> {
    T::deserialize(&envelope.payload).map_err(|e| {
        ProcessError::MalformedEvent(format!(
            "{} payload does not match schema: {}",
            envelope.event_type, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_registration() {
        let envelope = EventEnvelope::new(
            USER_REGISTERED,
            json!({"id": 42, "email": "a@x.com", "name": "Ann", "phone": "+1555"}),
        );

        let event = DomainEvent::decode(&envelope).unwrap();

        assert_eq!(
            event,
            DomainEvent::UserRegistered(UserRegistered {
                id: 42,
                email: "a@x.com".to_string(),
                name: "Ann".to_string(),
                phone: "+1555".to_string(),
            })
        );
        assert_eq!(event.user_id(), 42);
    }

    #[test]
    fn tolerates_extra_fields_and_missing_optionals() {
        let envelope = EventEnvelope::new(
            PASSWORD_CHANGED,
            json!({"id": 5, "email": "p@x.com", "name": "Pat", "ip": "10.0.0.1"}),
        );

        let DomainEvent::PasswordChanged(event) = DomainEvent::decode(&envelope).unwrap() else {
            panic!("expected PasswordChanged");
        };

        assert_eq!(event.phone, None);
        assert_eq!(event.channel, None);
    }

    #[test]
    fn reads_explicit_channel() {
        let envelope = EventEnvelope::new(
            USER_LOGGED_IN,
            json!({"id": 5, "email": "p@x.com", "name": "Pat", "phone": "+5730011", "channel": "SMS"}),
        );

        let DomainEvent::UserLoggedIn(event) = DomainEvent::decode(&envelope).unwrap() else {
            panic!("expected UserLoggedIn");
        };

        assert_eq!(event.channel, Some(Channel::Sms));
    }

    #[test]
    fn missing_field_is_malformed() {
        let envelope = EventEnvelope::new(OTP_REQUESTED, json!({"id": 1, "email": "a@x.com"}));

        assert!(matches!(
            DomainEvent::decode(&envelope),
            Err(ProcessError::MalformedEvent(_))
        ));
    }

    #[test]
    fn wrong_type_is_malformed() {
        let envelope = EventEnvelope::new(
            USER_REGISTERED,
            json!({"id": "42", "email": "a@x.com", "name": "Ann", "phone": "+1555"}),
        );

        assert!(matches!(
            DomainEvent::decode(&envelope),
            Err(ProcessError::MalformedEvent(_))
        ));
    }

    #[test]
    fn unused_phone_format_is_not_checked() {
        let envelope = EventEnvelope::new(
            USER_REGISTERED,
            json!({"id": 42, "email": "a@x.com", "name": "Ann", "phone": "+57 300 111 2233"}),
        );

        assert!(DomainEvent::decode(&envelope).is_ok());
    }

    #[test]
    fn invalid_email_is_malformed() {
        let envelope = EventEnvelope::new(
            OTP_REQUESTED,
            json!({"id": 1, "email": "nobody", "name": "N", "url": "https://x.com/otp"}),
        );

        assert!(matches!(
            DomainEvent::decode(&envelope),
            Err(ProcessError::MalformedEvent(_))
        ));
    }
}
