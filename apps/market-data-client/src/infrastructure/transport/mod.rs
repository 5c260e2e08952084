//! Transport Adapters
//!
//! WebSocket and in-memory implementations of the channel ports.

pub mod memory;
pub mod reconnect;
pub mod websocket;

pub use memory::{InMemoryRequestChannel, InMemorySubscriberChannel, Responder};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use websocket::{WsRequestChannel, WsSubscriberChannel};
