//! # relay-gateway
//!
//! WebSocket gateway for real-time chat broadcast and private messaging.
//!
//! Clients authenticate with a signed token, upgrade to a WebSocket, and
//! exchange JSON message envelopes routed by a per-channel
//! [`realtime::Hub`]. Delivery is best-effort and in-memory: every
//! queue in the core is bounded, every enqueue is non-blocking, and a
//! consumer that cannot keep up is evicted rather than allowed to stall
//! anyone else.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── Upgrade Gate (ws/)
//!     │       token check, frame size limit
//!     │
//!     ├── Connection Pumps (realtime/client)
//!     │       read pump  ──▶ hub inbound stream
//!     │       write pump ◀── bounded outbound queue, heartbeats
//!     │
//!     ├── Hub (realtime/hub)
//!     │       single-task roster, fan-out, eviction
//!     ├── Dispatcher (realtime/dispatcher)
//!     │
//!     └── TokenValidator (auth)
//!             account-service JWTs, injected
//! ```

pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod ws;
