//! Push channel for the dashboard.
//!
//! Provides:
//! - Wire frames (`{ event, payload }` JSON)
//! - Connector seam, with an in-memory connector for tests (feature: memory)
//! - WebSocket connector (feature: websocket)
//! - Channel state machine, the token-driven provider and named-list subscriptions

pub mod client;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod protocol;
pub mod provider;
pub mod subscription;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::{ChannelState, Emitter, ListenerId, PushChannel};
pub use error::ChannelError;
pub use protocol::Frame;
pub use provider::ChannelProvider;
pub use subscription::{ListRequest, ListSubscription};
pub use transport::{ChannelConnector, ChannelLink, LinkEvent};
#[cfg(feature = "websocket")]
pub use websocket::WsConnector;
