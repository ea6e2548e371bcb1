//! Process-wide channel client.
//!
//! [`ChannelClient`] owns the single WebSocket connection shared by every
//! session view in one client instance. It spawns a connection task
//! (connect -> process frames -> reconnect), tracks the one active session
//! topic in a [`SubscriptionTable`], and fans parsed [`ServerEvent`]s out
//! through a [`tokio::sync::broadcast`] channel.
//!
//! `join` and `leave` are synchronous and never fail: while the transport
//! is down they only update the table, and the connection task re-issues
//! the join once it reconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mentorlink_core::types::DbId;

use crate::connection::ChannelEndpoint;
use crate::processor::run_session;
use crate::protocol::{parse_event, ClientCommand, ServerEvent};
use crate::reconnect::{reconnect_loop, Backoff, ReconnectConfig};
use crate::subscription::{JoinState, SubscriptionTable};

/// Broadcast channel capacity for pushed events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `shutdown` waits for the connection task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Sender half used by the connection task to write commands to the socket.
pub type CommandSender = mpsc::UnboundedSender<ClientCommand>;

/// Callback run after the transport comes back from a disconnect.
pub type ReconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Token identifying an installed reconnect handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Inner {
    table: SubscriptionTable,
    outbound: Option<CommandSender>,
    /// Set after the first successful attach; later attaches are reconnects.
    connected_before: bool,
    /// At most one handler. Installing a new one drops the previous.
    reconnect_handler: Option<(HandlerId, ReconnectHandler)>,
}

pub struct ChannelClient {
    endpoint: ChannelEndpoint,
    reconnect: ReconnectConfig,
    inner: Mutex<Inner>,
    event_tx: broadcast::Sender<ServerEvent>,
    status_tx: watch::Sender<bool>,
    next_handler_id: AtomicU64,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelClient {
    /// Create a client. Nothing connects until [`start`](Self::start).
    pub fn new(endpoint: ChannelEndpoint, reconnect: ReconnectConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(false);

        Arc::new(Self {
            endpoint,
            reconnect,
            inner: Mutex::new(Inner {
                table: SubscriptionTable::new(),
                outbound: None,
                connected_before: false,
                reconnect_handler: None,
            }),
            event_tx,
            status_tx,
            next_handler_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Spawn the connection task. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let client = Arc::clone(self);
        let cancel = self.cancel.child_token();
        *task = Some(tokio::spawn(async move {
            tracing::info!(url = client.endpoint.ws_url(), "Starting channel task");
            run_connection_loop(&client, &cancel).await;
            tracing::info!("Channel task exited");
        }));
    }

    /// Receive every accepted server event.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_tx.subscribe()
    }

    /// Observe transport up/down transitions.
    pub fn watch_connection(&self) -> watch::Receiver<bool> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().table.is_connected()
    }

    pub fn active_session(&self) -> Option<DbId> {
        self.lock().table.active_session()
    }

    pub fn join_state(&self, session_id: DbId) -> JoinState {
        self.lock().table.state_of(session_id)
    }

    /// Make `session_id` the active topic, leaving any other one.
    ///
    /// Idempotent for the already-active session. Returns `Joining` when
    /// the transport is down; the join goes out on the next connect.
    pub fn join(&self, session_id: DbId) -> JoinState {
        let mut inner = self.lock();
        let commands = inner.table.join(session_id);
        if commands.is_empty() {
            tracing::debug!(session_id, "Join is a no-op");
        } else {
            tracing::info!(session_id, "Joining session topic");
        }
        send_all(&mut inner, commands);
        inner.table.state_of(session_id)
    }

    /// Stop listening to `session_id`.
    ///
    /// Safe to call when already left, while disconnected, before the join
    /// ever reached the wire, and from `Drop` implementations.
    pub fn leave(&self, session_id: DbId) {
        let mut inner = self.lock();
        let commands = inner.table.leave(session_id);
        if !commands.is_empty() {
            tracing::info!(session_id, "Leaving session topic");
        }
        send_all(&mut inner, commands);
    }

    /// Install the callback run after each reconnect, replacing (and
    /// thereby de-registering) any previous one.
    pub fn set_reconnect_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .lock()
            .reconnect_handler
            .replace((id, Arc::new(handler)));
        if let Some((old, _)) = previous {
            tracing::debug!(?old, new = ?id, "Replaced reconnect handler");
        }
        id
    }

    /// Remove the handler if `id` is still the installed one.
    pub fn clear_reconnect_handler(&self, id: HandlerId) -> bool {
        let mut inner = self.lock();
        match &inner.reconnect_handler {
            Some((current, _)) if *current == id => {
                inner.reconnect_handler = None;
                true
            }
            _ => false,
        }
    }

    /// Hand the client a live command sink. Called by the connection task
    /// once a socket is open.
    pub fn attach_transport(&self, sender: CommandSender) {
        let handler = {
            let mut inner = self.lock();
            if inner.table.is_connected() {
                inner.outbound = Some(sender);
                return;
            }
            inner.outbound = Some(sender);
            let commands = inner.table.on_connected();
            send_all(&mut inner, commands);

            let reconnected = inner.connected_before;
            inner.connected_before = true;
            if reconnected {
                inner
                    .reconnect_handler
                    .as_ref()
                    .map(|(_, handler)| Arc::clone(handler))
            } else {
                None
            }
        };

        self.status_tx.send_replace(true);
        if let Some(handler) = handler {
            tracing::debug!("Running reconnect handler");
            handler();
        }
    }

    /// Forget the command sink. Called by the connection task when the
    /// socket closes.
    pub fn detach_transport(&self) {
        {
            let mut inner = self.lock();
            inner.outbound = None;
            inner.table.on_disconnected();
        }
        self.status_tx.send_replace(false);
    }

    /// Parse one inbound text frame and broadcast it if it is accepted.
    ///
    /// Topic-scoped events for a session that is not currently joined are
    /// dropped, so nothing is processed for a view that already left.
    pub fn dispatch_frame(&self, text: &str) {
        let event = match parse_event(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, raw_message = %text, "Failed to parse channel frame");
                return;
            }
        };

        let session_id = event.session_id();
        if event.is_topic_scoped() && !self.lock().table.accepts(session_id) {
            tracing::debug!(
                session_id,
                event = event.name(),
                "Dropping event for inactive session",
            );
            return;
        }

        tracing::debug!(session_id, event = event.name(), "Channel event");
        // A SendError only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }

    /// Leave the active topic, stop the connection task, and wait briefly
    /// for it to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down channel client");
        if let Some(session_id) = self.active_session() {
            self.leave(session_id);
        }
        self.cancel.cancel();

        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
        }
        tracing::info!("Channel client shut down");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Put commands on the wire. A closed sink marks the transport down so
/// the table re-joins on the next connect.
fn send_all(inner: &mut Inner, commands: Vec<ClientCommand>) {
    for command in commands {
        let Some(sender) = &inner.outbound else {
            return;
        };
        if sender.send(command).is_err() {
            tracing::debug!(
                session_id = command.session_id(),
                "Command sink closed, marking channel disconnected",
            );
            inner.outbound = None;
            inner.table.on_disconnected();
            return;
        }
    }
}

/// Connect -> process frames -> reconnect, until cancelled.
async fn run_connection_loop(client: &ChannelClient, cancel: &CancellationToken) {
    let mut backoff = Backoff::new(client.reconnect.clone());
    loop {
        let Some(conn) = reconnect_loop(&client.endpoint, &mut backoff, cancel).await else {
            return;
        };

        tracing::info!(connection_id = %conn.connection_id, "Channel connection established");
        let connected_at = tokio::time::Instant::now();
        run_session(conn.ws_stream, client, cancel).await;
        backoff.record_connection(connected_at.elapsed());

        if cancel.is_cancelled() {
            return;
        }
        tracing::info!("Channel connection lost, entering reconnect loop");
    }
}
