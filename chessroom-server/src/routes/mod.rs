//! HTTP and WebSocket route handlers

pub mod status;
pub mod ws;
