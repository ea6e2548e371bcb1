//! WebSocket connection to the platform's real-time endpoint.
//!
//! [`ChannelEndpoint`] holds the URL and credentials. Call
//! [`ChannelEndpoint::connect`] to open a live [`ChannelConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Raw WebSocket stream type used by the channel.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Where and how to open the channel.
#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    ws_url: String,
    auth_token: Option<String>,
}

/// A live WebSocket connection.
pub struct ChannelConnection {
    /// Identifier sent during the handshake, used to correlate server logs.
    pub connection_id: String,
    pub ws_stream: WsStream,
}

impl ChannelEndpoint {
    /// * `ws_url`     - WebSocket URL, e.g. `ws://host:3000/ws`.
    /// * `auth_token` - bearer token issued by the (external) auth service.
    pub fn new(ws_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            auth_token,
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full handshake URL for a given connection id.
    pub fn handshake_url(&self, connection_id: &str) -> String {
        let separator = if self.ws_url.contains('?') { '&' } else { '?' };
        match &self.auth_token {
            Some(token) => format!(
                "{}{separator}connectionId={connection_id}&token={token}",
                self.ws_url
            ),
            None => format!("{}{separator}connectionId={connection_id}", self.ws_url),
        }
    }

    /// Open the WebSocket.
    ///
    /// Generates a fresh `connection_id` (UUID v4) per attempt.
    pub async fn connect(&self) -> Result<ChannelConnection, ChannelError> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let url = self.handshake_url(&connection_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ChannelError::Connection(format!(
                "Failed to connect to channel at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            connection_id = %connection_id,
            "Connected to channel at {}",
            self.ws_url,
        );

        Ok(ChannelConnection {
            connection_id,
            ws_stream,
        })
    }
}

/// Errors that can occur on the channel transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A command could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
