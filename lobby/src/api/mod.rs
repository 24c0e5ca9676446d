//! HTTP API handlers.

pub mod lobbies;
pub mod manager;
