pub mod health;
pub mod kafka;
pub mod memory;
