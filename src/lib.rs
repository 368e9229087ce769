pub mod api;
pub mod broker;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod processor;
pub mod registry;
pub mod service;
