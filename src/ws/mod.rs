//! WebSocket upgrade surface.
//!
//! The endpoints under `/ws/` authenticate a credential token and hand
//! the upgraded connection to the realtime core.

pub mod handler;
