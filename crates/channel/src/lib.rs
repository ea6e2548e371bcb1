//! Real-time channel client for mentorship sessions.
//!
//! Provides the typed wire protocol, WebSocket connection handling,
//! reconnection with exponential backoff, and the process-wide
//! [`ChannelClient`](client::ChannelClient) that keeps at most one session
//! topic joined at a time and re-joins it after every reconnect.

pub mod client;
pub mod connection;
pub mod processor;
pub mod protocol;
pub mod reconnect;
pub mod subscription;

pub use client::{ChannelClient, HandlerId};
pub use connection::{ChannelEndpoint, ChannelError};
pub use protocol::{ClientCommand, ServerEvent};
pub use reconnect::ReconnectConfig;
pub use subscription::JoinState;
