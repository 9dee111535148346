//! HTTP and WebSocket handlers.

pub mod commands;
pub mod events;
pub mod health;
pub mod info;
