use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Email,
    Sms,
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Channel::Email => write!(f, "EMAIL"),
            Channel::Sms => write!(f, "SMS"),
        }
    }
}

pub const TEMPLATE_VALIDATE_ACCOUNT: &str = "validate_account";
pub const TEMPLATE_LOGIN_NOTIFICATION: &str = "login_notification";
pub const TEMPLATE_PASSWORD_RECOVERY: &str = "password_recovery";
pub const TEMPLATE_OTP_VERIFICATION: &str = "otp_verification";

/// Request published to the outbound topic, keyed by `recipient`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub user_id: i64,
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    pub name: String,
    pub channel: Channel,
    pub template: String,
    pub recipient: String,

    #[serde(default)]
    pub data: HashMap<String, String>,
}
