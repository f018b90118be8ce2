//! Phone viewer: joins an existing session and mirrors its photos.

use tokio::sync::watch;
use tracing::info;
use wire::ClientMessage;

use crate::config::BoothConfig;
use crate::session::{Effect, Photo, Screen, SessionState};
use crate::transport::{ConnectionStatus, EventStream, Role, Transport};

/// What a single [`Phone::step`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhoneUpdate {
    Server(&'static str),
    Connection(ConnectionStatus),
    /// The session is over; the phone has disconnected.
    Ended,
}

pub struct Phone {
    transport: Transport,
    events: EventStream,
    status: watch::Receiver<ConnectionStatus>,
    state: SessionState,
}

impl Phone {
    /// Join `session_id` as a phone. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn join(config: &BoothConfig, session_id: &str) -> Self {
        let (mut transport, events) = Transport::new(Role::Phone, config);
        let status = transport.watch_status();
        let mut state = SessionState::new(Role::Phone);
        state.begin(session_id);
        transport.connect(session_id);
        info!(%session_id, "phone: joining session");

        Self { transport, events, status, state }
    }

    /// Wait for and apply the next change. Cancel-safe.
    pub async fn step(&mut self) -> PhoneUpdate {
        tokio::select! {
            Some(event) = self.events.next() => {
                let kind = event.kind();
                let effects = self.state.apply(event);
                if effects.contains(&Effect::SessionClosed) {
                    info!(session_id = ?self.state.session_id(), "phone: session ended");
                    self.transport.close();
                    return PhoneUpdate::Ended;
                }
                PhoneUpdate::Server(kind)
            }
            Ok(()) = self.status.changed() => {
                PhoneUpdate::Connection(*self.status.borrow_and_update())
            }
        }
    }

    /// Ask the backend to mark a photo as downloaded.
    ///
    /// Returns `false` for unknown photos or while disconnected.
    pub fn request_download(&self, photo_id: &str) -> bool {
        if self.state.photo(photo_id).is_none() {
            return false;
        }
        self.transport.send(&ClientMessage::DownloadPhoto { photo_id: photo_id.to_owned() })
    }

    #[must_use]
    pub fn photo(&self, photo_id: &str) -> Option<&Photo> {
        self.state.photo(photo_id)
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
    pub fn connection_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Disconnect for good.
    pub fn leave(mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
#[path = "phone_test.rs"]
mod tests;
