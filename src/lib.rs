//! Streamgate - HTTP gateway that tunes media relay pipelines on demand
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod pipeline;
pub mod relay;
pub mod server;
pub mod tools;
pub mod tuner;
pub mod workspace;
