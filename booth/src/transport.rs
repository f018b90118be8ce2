//! WebSocket transport for one client role.
//!
//! DESIGN
//! ======
//! A `Transport` owns at most one background connection task. The task
//! connects, forwards decoded events into the [`EventStream`], drains the
//! outbound queue into the socket, and sends heartbeats for the phone role.
//!
//! RECONNECT
//! =========
//! Every close is classified with [`CloseReason`]. A retryable close
//! schedules exactly one reconnect after `reconnect_delay`; if that attempt
//! fails it is itself an abnormal close and schedules the next one. Terminal
//! closes and explicit `close()` never reconnect.
//!
//! Each `connect()`/`close()` bumps a generation counter. Events and status
//! updates from a task spawned for an older generation are discarded, so a
//! superseded reconnect can never resurrect a stale socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};
use wire::{ClientMessage, CloseReason, ServerEvent};

use crate::config::BoothConfig;

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Which client a connection belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Kiosk,
    Phone,
}

impl Role {
    /// Path segment used in `/ws/{role}/{session_id}`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kiosk => "kiosk",
            Self::Phone => "phone",
        }
    }
}

/// Observable connection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// The single, non-restartable stream of server events for one transport.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<(u64, ServerEvent)>,
    generation: Arc<AtomicU64>,
}

impl EventStream {
    /// Next event from the current connection.
    ///
    /// Cancel-safe. Returns `None` only once the owning [`Transport`] is gone.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        loop {
            let (generation, event) = self.rx.recv().await?;
            if generation == self.generation.load(Ordering::Acquire) {
                return Some(event);
            }
            debug!(kind = event.kind(), "dropping event from superseded connection");
        }
    }
}

pub struct Transport {
    role: Role,
    config: BoothConfig,
    generation: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<(u64, ServerEvent)>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    session_id: Option<String>,
}

impl Transport {
    #[must_use]
    pub fn new(role: Role, config: &BoothConfig) -> (Self, EventStream) {
        let (events, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let generation = Arc::new(AtomicU64::new(0));

        let stream = EventStream { rx, generation: generation.clone() };
        let transport = Self {
            role,
            config: config.clone(),
            generation,
            events,
            status: Arc::new(status),
            outbound: None,
            task: None,
            session_id: None,
        };
        (transport, stream)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Session the transport is bound to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Open a connection for `session_id`, replacing any previous one.
    ///
    /// Returns immediately; progress is visible through the status channel.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&mut self, session_id: &str) {
        self.stop();

        let generation = self.generation.load(Ordering::Acquire);
        let (outbound, queue) = mpsc::unbounded_channel();
        let task = ConnectionTask {
            url: self.config.ws_url(self.role, session_id),
            role: self.role,
            session_id: session_id.to_owned(),
            generation,
            current: self.generation.clone(),
            events: self.events.clone(),
            status: self.status.clone(),
            reconnect_delay: self.config.reconnect_delay,
            heartbeat: match self.role {
                Role::Phone => Some(self.config.heartbeat_interval),
                Role::Kiosk => None,
            },
        };

        info!(role = self.role.as_str(), %session_id, generation, "ws: connecting");
        self.session_id = Some(session_id.to_owned());
        self.outbound = Some(outbound);
        self.task = Some(tokio::spawn(task.run(queue)));
    }

    /// Queue a message for the open socket.
    ///
    /// Returns `false` without sending anything when the socket is not open.
    pub fn send(&self, message: &ClientMessage) -> bool {
        if self.status() != ConnectionStatus::Connected {
            debug!(kind = message.kind(), "ws: not connected, dropping outbound message");
            return false;
        }
        let Some(outbound) = &self.outbound else {
            return false;
        };
        outbound.send(wire::encode(message)).is_ok()
    }

    /// Close the connection and cancel any pending reconnect or heartbeat.
    pub fn close(&mut self) {
        if self.task.is_some() {
            info!(role = self.role.as_str(), session_id = ?self.session_id, "ws: closing");
        }
        self.stop();
        self.session_id = None;
    }

    fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        // An open socket notices its queue closing and sends a normal close
        // frame on its own. Anything else (connecting, waiting to retry) is
        // cancelled outright.
        self.outbound = None;
        if let Some(task) = self.task.take() {
            if self.status() != ConnectionStatus::Connected {
                task.abort();
            }
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

struct ConnectionTask {
    url: String,
    role: Role,
    session_id: String,
    generation: u64,
    current: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<(u64, ServerEvent)>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    reconnect_delay: Duration,
    heartbeat: Option<Duration>,
}

impl ConnectionTask {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<String>) {
        loop {
            if !self.is_current() {
                return;
            }
            self.set_status(ConnectionStatus::Connecting);

            let reason = match connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    if !self.is_current() {
                        return;
                    }
                    info!(role = self.role.as_str(), session_id = %self.session_id, "ws: connected");
                    // Anything queued for an earlier socket is stale.
                    while queue.try_recv().is_ok() {}
                    self.set_status(ConnectionStatus::Connected);
                    self.serve(socket, &mut queue).await
                }
                Err(error) => {
                    warn!(role = self.role.as_str(), session_id = %self.session_id, %error, "ws: connect failed");
                    CloseReason::Abnormal
                }
            };

            self.set_status(ConnectionStatus::Disconnected);
            if reason.is_terminal() {
                info!(
                    role = self.role.as_str(),
                    session_id = %self.session_id,
                    code = reason.code(),
                    "ws: closed, not reconnecting"
                );
                return;
            }

            info!(
                role = self.role.as_str(),
                session_id = %self.session_id,
                code = reason.code(),
                delay_ms = u64::try_from(self.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
                "ws: closed, reconnect scheduled"
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Pump one open socket until it closes. Returns why it closed.
    async fn serve(&self, socket: Socket, queue: &mut mpsc::UnboundedReceiver<String>) -> CloseReason {
        let (mut write, mut read) = socket.split();
        let mut heartbeat = self.heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                outgoing = queue.recv() => {
                    let Some(text) = outgoing else {
                        let frame = CloseFrame { code: CloseCode::Normal, reason: "client closed".into() };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        return CloseReason::Normal;
                    };
                    if let Err(error) = write.send(Message::Text(text.into())).await {
                        warn!(session_id = %self.session_id, %error, "ws: send failed");
                        return CloseReason::Abnormal;
                    }
                }
                () = next_tick(&mut heartbeat) => {
                    debug!(session_id = %self.session_id, "ws: heartbeat");
                    if let Err(error) = write.send(Message::Text(wire::encode(&ClientMessage::Ping).into())).await {
                        warn!(session_id = %self.session_id, %error, "ws: heartbeat failed");
                        return CloseReason::Abnormal;
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.deliver(text.as_str()),
                        Some(Ok(Message::Close(frame))) => {
                            return CloseReason::from_code(frame.map(|frame| u16::from(frame.code)));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            warn!(session_id = %self.session_id, %error, "ws: receive failed");
                            return CloseReason::Abnormal;
                        }
                        None => return CloseReason::Abnormal,
                    }
                }
            }
        }
    }

    fn deliver(&self, text: &str) {
        match wire::decode(text) {
            Ok(Some(ServerEvent::Pong)) => debug!(session_id = %self.session_id, "ws: pong"),
            Ok(Some(event)) => {
                debug!(session_id = %self.session_id, kind = event.kind(), "ws: event");
                let _ = self.events.send((self.generation, event));
            }
            Ok(None) => debug!(session_id = %self.session_id, "ws: ignoring unknown message kind"),
            Err(error) => warn!(session_id = %self.session_id, %error, "ws: dropping malformed message"),
        }
    }

    fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }

    fn set_status(&self, status: ConnectionStatus) {
        if self.is_current() {
            self.status.send_replace(status);
        }
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
