//! Per-connection frame loop.
//!
//! Splits a live socket into sink and stream, hands the client a command
//! sender, and multiplexes outbound commands with inbound frames via
//! `tokio::select!` until the socket closes or the client is cancelled.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::ChannelClient;
use crate::connection::{ChannelError, WsStream};
use crate::protocol::ClientCommand;

/// Drive one WebSocket connection.
///
/// Returns when the server closes the socket, a receive or send error
/// occurs, the stream is exhausted, or `cancel` fires. The client is
/// detached from the transport before returning in every case.
pub async fn run_session(ws_stream: WsStream, client: &ChannelClient, cancel: &CancellationToken) {
    let (mut sink, mut stream) = ws_stream.split();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<ClientCommand>();

    client.attach_transport(command_tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Flush pending leaves before closing.
                while let Ok(command) = command_rx.try_recv() {
                    if let Err(e) = send_command(&mut sink, command).await {
                        tracing::debug!(error = %e, "Failed to flush command on shutdown");
                        break;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                tracing::info!("Channel session cancelled");
                break;
            }
            Some(command) = command_rx.recv() => {
                if let Err(e) = send_command(&mut sink, command).await {
                    tracing::error!(
                        session_id = command.session_id(),
                        error = %e,
                        "Failed to send channel command",
                    );
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        client.dispatch_frame(&text);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Server closed channel");
                        break;
                    }
                    Some(Ok(_)) => {
                        tracing::trace!("Ignoring non-text channel frame");
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Channel receive error");
                        break;
                    }
                    None => {
                        tracing::info!("Channel stream exhausted");
                        break;
                    }
                }
            }
        }
    }

    client.detach_transport();
}

/// Encode a command and write it as a text frame.
async fn send_command<S>(sink: &mut S, command: ClientCommand) -> Result<(), ChannelError>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = command.encode()?;
    tracing::debug!(event = %json, "Sending channel command");
    sink.send(Message::Text(json))
        .await
        .map_err(|e| ChannelError::Protocol(e.to_string()))
}
