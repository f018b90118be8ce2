//! Kiosk controller: session lifecycle and capture commands.
//!
//! DESIGN
//! ======
//! A `Kiosk` is driven from one task. [`Kiosk::dispatch`] turns an operator
//! intent into local state changes and spawns the matching HTTP request;
//! [`Kiosk::step`] waits for whatever happens next (a pushed event, an HTTP
//! outcome, a connection change, or an error banner expiring) and folds it
//! into the [`SessionState`].
//!
//! HTTP outcomes are tagged with the session they were issued for. An
//! outcome for a session that has since been ended or replaced is dropped.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, CreatedSession};
use crate::config::BoothConfig;
use crate::session::{Effect, Screen, SessionState};
use crate::transport::{ConnectionStatus, EventStream, Role, Transport};

pub const GENERIC_CAPTURE_ERROR: &str = "Capture failed. Please try again.";
pub const GENERIC_CREATE_ERROR: &str = "Could not start a session. Please try again.";

/// Operator actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    StartSession,
    Capture,
    EndSession,
}

/// What a single [`Kiosk::step`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    /// A server event of this kind was applied.
    Server(&'static str),
    Connection(ConnectionStatus),
    SessionCreated(String),
    CreateFailed,
    /// The capture request returned successfully.
    CaptureAccepted,
    /// The capture request failed and the optimistic state was rolled back.
    CaptureRejected,
    /// The best-effort end request finished (successfully or not).
    EndNotified,
    /// An outcome arrived for a session that is no longer current.
    Stale,
    ErrorCleared,
}

enum Outcome {
    Created(Result<CreatedSession, ApiError>),
    Captured { session_id: String, result: Result<(), ApiError> },
    Ended { session_id: String, result: Result<(), ApiError> },
}

pub struct Kiosk {
    api: ApiClient,
    transport: Transport,
    events: EventStream,
    status: watch::Receiver<ConnectionStatus>,
    state: SessionState,
    created: Option<CreatedSession>,
    starting: bool,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
    error_display: Duration,
    error_deadline: Option<(u64, Instant)>,
}

impl Kiosk {
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &BoothConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(config)?;
        let (transport, events) = Transport::new(Role::Kiosk, config);
        let status = transport.watch_status();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        Ok(Self {
            api,
            transport,
            events,
            status,
            state: SessionState::new(Role::Kiosk),
            created: None,
            starting: false,
            outcomes_tx,
            outcomes_rx,
            error_display: config.error_display,
            error_deadline: None,
        })
    }

    /// Act on an operator intent.
    ///
    /// Returns `false` when the intent does not apply in the current state
    /// (a second start, capture without a session, end without a session).
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::StartSession => self.start_session(),
            Intent::Capture => self.capture(),
            Intent::EndSession => self.end_session(),
        }
    }

    /// Wait for and apply the next change. Cancel-safe.
    pub async fn step(&mut self) -> Update {
        let deadline = self.error_deadline;
        tokio::select! {
            Some(event) = self.events.next() => {
                let kind = event.kind();
                let effects = self.state.apply(event);
                self.run_effects(effects);
                Update::Server(kind)
            }
            Some(outcome) = self.outcomes_rx.recv() => self.on_outcome(outcome),
            Ok(()) = self.status.changed() => {
                Update::Connection(*self.status.borrow_and_update())
            }
            () = error_timer(deadline) => {
                self.error_deadline = None;
                if let Some((token, _)) = deadline {
                    self.state.clear_error(token);
                }
                Update::ErrorCleared
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.state.session_id()
    }

    /// Links returned when the current session was created.
    #[must_use]
    pub fn created(&self) -> Option<&CreatedSession> {
        self.created.as_ref()
    }

    /// A create request is in flight.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        self.starting
    }

    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // =========================================================================
    // INTENTS
    // =========================================================================

    fn start_session(&mut self) -> bool {
        if self.starting || self.state.session_id().is_some() {
            return false;
        }
        self.starting = true;

        let api = self.api.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Outcome::Created(api.create_session().await));
        });
        true
    }

    fn capture(&mut self) -> bool {
        let Some(session_id) = self.state.session_id().map(ToOwned::to_owned) else {
            return false;
        };
        if !self.state.begin_capture() {
            return false;
        }
        self.error_deadline = None;

        let api = self.api.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = api.capture(&session_id).await;
            let _ = tx.send(Outcome::Captured { session_id, result });
        });
        true
    }

    fn end_session(&mut self) -> bool {
        let Some(session_id) = self.state.session_id().map(ToOwned::to_owned) else {
            return false;
        };
        info!(%session_id, "kiosk: ending session");
        self.teardown();

        let api = self.api.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = api.end_session(&session_id).await;
            let _ = tx.send(Outcome::Ended { session_id, result });
        });
        true
    }

    // =========================================================================
    // OUTCOMES
    // =========================================================================

    fn on_outcome(&mut self, outcome: Outcome) -> Update {
        match outcome {
            Outcome::Created(Ok(session)) => {
                self.starting = false;
                let session_id = session.id.clone();
                self.state.begin(&session_id);
                self.transport.connect(&session_id);
                self.created = Some(session);
                Update::SessionCreated(session_id)
            }
            Outcome::Created(Err(error)) => {
                self.starting = false;
                warn!(%error, "kiosk: create session failed");
                let message = error.detail().unwrap_or(GENERIC_CREATE_ERROR).to_owned();
                let effect = self.state.raise_error(message);
                self.run_effects(vec![effect]);
                Update::CreateFailed
            }
            Outcome::Captured { session_id, result } => {
                if self.state.session_id() != Some(session_id.as_str()) {
                    return Update::Stale;
                }
                match result {
                    Ok(()) => Update::CaptureAccepted,
                    Err(error) => {
                        warn!(%session_id, %error, "kiosk: capture failed");
                        let message = error.detail().unwrap_or(GENERIC_CAPTURE_ERROR).to_owned();
                        let effect = self.state.reject_capture(message);
                        self.run_effects(vec![effect]);
                        Update::CaptureRejected
                    }
                }
            }
            Outcome::Ended { session_id, result } => {
                if let Err(error) = result {
                    warn!(%session_id, %error, "kiosk: end session request failed");
                }
                Update::EndNotified
            }
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleErrorClear { token } => {
                    self.error_deadline = Some((token, Instant::now() + self.error_display));
                }
                Effect::SessionClosed => {
                    info!(session_id = ?self.state.session_id(), "kiosk: session ended by server");
                    self.teardown();
                }
            }
        }
    }

    fn teardown(&mut self) {
        self.transport.close();
        self.state.reset();
        self.created = None;
        self.error_deadline = None;
    }
}

async fn error_timer(deadline: Option<(u64, Instant)>) {
    match deadline {
        Some((_, at)) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "kiosk_test.rs"]
mod tests;
