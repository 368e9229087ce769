pub mod event;
pub mod health;
pub mod message;
pub mod notification;
pub mod pool;
pub mod validation;
