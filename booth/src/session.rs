//! Client-side projection of a booth session.
//!
//! [`SessionState`] folds server events into the data a screen needs and
//! picks which screen to show. It is plain data: no I/O, no timers. Timed
//! behaviour is requested through [`Effect`]s that the owning controller
//! carries out.

use tracing::{debug, warn};
use wire::{CaptureProgress, Failure, PhotoPayload, ServerEvent};

use crate::transport::Role;

pub const GENERIC_CAPTURE_FAILURE: &str = "Capture failed";
pub const GENERIC_SERVER_ERROR: &str = "Something went wrong";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Idle,
    Active,
    Ended,
}

/// What the client should be showing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    NoSession,
    Waiting,
    CountingDown(u32),
    Processing,
    Photos,
}

/// A finished photo, numbered by arrival.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    /// 1-based position in the session; defines display and strip order.
    pub sequence: u32,
    pub thumbnail_url: String,
    pub web_url: String,
}

/// Transient error message. Only the timer holding the same token may clear it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorBanner {
    pub token: u64,
    pub message: String,
}

/// Side effects requested by a state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Call [`SessionState::clear_error`] with this token after the display period.
    ScheduleErrorClear { token: u64 },
    /// The backend ended the session; tear the connection down.
    SessionClosed,
}

#[derive(Clone, Debug)]
pub struct SessionState {
    role: Role,
    session_id: Option<String>,
    lifecycle: Lifecycle,
    phone_count: u32,
    kiosk_connected: bool,
    photos: Vec<Photo>,
    countdown: Option<u32>,
    photo_number: Option<u32>,
    total_photos: u32,
    capturing: bool,
    processing: bool,
    strip_url: Option<String>,
    error: Option<ErrorBanner>,
    next_token: u64,
}

impl SessionState {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            session_id: None,
            lifecycle: Lifecycle::Idle,
            phone_count: 0,
            kiosk_connected: false,
            photos: Vec::new(),
            countdown: None,
            photo_number: None,
            total_photos: 1,
            capturing: false,
            processing: false,
            strip_url: None,
            error: None,
            next_token: 1,
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Apply one server event.
    pub fn apply(&mut self, event: ServerEvent) -> Vec<Effect> {
        debug!(role = self.role.as_str(), kind = event.kind(), "session: apply");
        match event {
            ServerEvent::SessionReady(info) => {
                if let Some(id) = info.session_id {
                    self.begin(&id);
                } else if self.session_id.is_some() {
                    self.lifecycle = Lifecycle::Active;
                }
            }
            ServerEvent::SessionState(snapshot) => {
                if let Some(id) = snapshot.session_id {
                    self.begin(&id);
                }
                if let Some(connected) = snapshot.kiosk_connected {
                    self.kiosk_connected = connected;
                }
                self.replace_photos(snapshot.photos);
            }
            ServerEvent::KioskConnected(presence) => {
                self.kiosk_connected = true;
                if let Some(count) = presence.phone_count {
                    self.phone_count = count;
                }
            }
            ServerEvent::PhoneConnected(_) => {
                self.phone_count = self.phone_count.saturating_add(1);
            }
            ServerEvent::PhoneDisconnected(_) => {
                self.phone_count = self.phone_count.saturating_sub(1);
            }
            ServerEvent::Countdown(tick) => match tick.value {
                Some(value) if value > 0 => {
                    self.countdown = Some(value);
                    self.capturing = true;
                    self.processing = false;
                    self.record_progress(tick.photo_number, tick.total_photos);
                }
                _ => self.countdown = None,
            },
            ServerEvent::CaptureStart(CaptureProgress { photo_number, total_photos, .. }) => {
                self.capturing = true;
                self.record_progress(photo_number, total_photos);
            }
            ServerEvent::Processing(_) => {
                self.countdown = None;
                self.capturing = true;
                self.processing = true;
            }
            ServerEvent::PhotoReady(payload) => self.push_photo(payload),
            ServerEvent::PhotoFailed(failure) => {
                if self.role == Role::Kiosk {
                    let reason = failure.error.as_deref().unwrap_or("unknown error");
                    let message = match failure.photo_number {
                        Some(n) => format!("Photo {n} failed: {reason}"),
                        None => format!("Photo failed: {reason}"),
                    };
                    return vec![self.raise_error(message)];
                }
            }
            ServerEvent::CaptureComplete(summary) => {
                self.end_capture();
                if summary.strip_url.is_some() {
                    self.strip_url = summary.strip_url;
                }
            }
            ServerEvent::CaptureFailed(failure) => {
                self.end_capture();
                return self.kiosk_error(&failure, GENERIC_CAPTURE_FAILURE);
            }
            ServerEvent::Error(failure) => return self.kiosk_error(&failure, GENERIC_SERVER_ERROR),
            ServerEvent::SessionEnded(ended) => {
                if let (Some(ended), Some(current)) = (&ended.session_id, &self.session_id) {
                    if ended != current {
                        debug!(%ended, %current, "session: ignoring end of another session");
                        return Vec::new();
                    }
                }
                self.clear_session_data();
                self.lifecycle = Lifecycle::Ended;
                return vec![Effect::SessionClosed];
            }
            ServerEvent::Pong => {}
        }
        Vec::new()
    }

    /// Start tracking `session_id`. Data from a different session is dropped.
    pub fn begin(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            self.clear_session_data();
            self.session_id = Some(session_id.to_owned());
        }
        self.lifecycle = Lifecycle::Active;
    }

    /// Back to `NoSession`. Error tokens keep counting so old timers stay stale.
    pub fn reset(&mut self) {
        let next_token = self.next_token;
        *self = Self::new(self.role);
        self.next_token = next_token;
    }

    // =========================================================================
    // KIOSK CAPTURE
    // =========================================================================

    /// Optimistically mark a capture as running.
    ///
    /// Returns `false` without changing anything when there is no active
    /// session or a capture is already running.
    pub fn begin_capture(&mut self) -> bool {
        if self.session_id.is_none() || self.lifecycle != Lifecycle::Active || self.capturing {
            return false;
        }
        self.capturing = true;
        self.error = None;
        true
    }

    /// Roll back an optimistic capture and show why it was refused.
    pub fn reject_capture(&mut self, message: impl Into<String>) -> Effect {
        self.end_capture();
        self.raise_error(message)
    }

    /// Show a transient error, replacing any current one.
    pub fn raise_error(&mut self, message: impl Into<String>) -> Effect {
        let token = self.next_token;
        self.next_token += 1;
        self.error = Some(ErrorBanner { token, message: message.into() });
        Effect::ScheduleErrorClear { token }
    }

    /// Clear the error if it is still the one `token` was issued for.
    pub fn clear_error(&mut self, token: u64) -> bool {
        if self.error.as_ref().is_some_and(|banner| banner.token == token) {
            self.error = None;
            return true;
        }
        false
    }

    // =========================================================================
    // VIEW
    // =========================================================================

    #[must_use]
    pub fn screen(&self) -> Screen {
        if self.session_id.is_none() {
            return Screen::NoSession;
        }
        if let Some(value) = self.countdown.filter(|value| *value > 0) {
            return Screen::CountingDown(value);
        }
        if self.processing {
            return Screen::Processing;
        }
        if self.photos.is_empty() { Screen::Waiting } else { Screen::Photos }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn phone_count(&self) -> u32 {
        self.phone_count
    }

    #[must_use]
    pub fn kiosk_connected(&self) -> bool {
        self.kiosk_connected
    }

    #[must_use]
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    #[must_use]
    pub fn photo(&self, id: &str) -> Option<&Photo> {
        self.photos.iter().find(|photo| photo.id == id)
    }

    #[must_use]
    pub fn countdown(&self) -> Option<u32> {
        self.countdown
    }

    #[must_use]
    pub fn photo_number(&self) -> Option<u32> {
        self.photo_number
    }

    #[must_use]
    pub fn total_photos(&self) -> u32 {
        self.total_photos
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    #[must_use]
    pub fn strip_url(&self) -> Option<&str> {
        self.strip_url.as_deref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ErrorBanner> {
        self.error.as_ref()
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn record_progress(&mut self, photo_number: Option<u32>, total_photos: Option<u32>) {
        if photo_number.is_some() {
            self.photo_number = photo_number;
        }
        if let Some(total) = total_photos {
            self.total_photos = total.max(1);
        }
    }

    fn end_capture(&mut self) {
        self.capturing = false;
        self.processing = false;
        self.countdown = None;
    }

    fn kiosk_error(&mut self, failure: &Failure, fallback: &str) -> Vec<Effect> {
        if self.role != Role::Kiosk {
            return Vec::new();
        }
        let message = failure.reason().unwrap_or(fallback).to_owned();
        vec![self.raise_error(message)]
    }

    fn push_photo(&mut self, payload: PhotoPayload) {
        let Some(photo) = photo_from(payload, next_sequence(&self.photos)) else {
            return;
        };
        debug!(photo_id = %photo.id, sequence = photo.sequence, "session: photo ready");
        self.photos.push(photo);
    }

    fn replace_photos(&mut self, mut payloads: Vec<PhotoPayload>) {
        // Snapshots without sequence numbers keep their listed order.
        payloads.sort_by_key(|payload| payload.sequence.unwrap_or(u32::MAX));
        self.photos.clear();
        for payload in payloads {
            if let Some(photo) = photo_from(payload, next_sequence(&self.photos)) {
                self.photos.push(photo);
            }
        }
    }

    fn clear_session_data(&mut self) {
        self.photos.clear();
        self.countdown = None;
        self.photo_number = None;
        self.total_photos = 1;
        self.capturing = false;
        self.processing = false;
        self.phone_count = 0;
        self.kiosk_connected = false;
        self.strip_url = None;
    }
}

fn next_sequence(photos: &[Photo]) -> u32 {
    u32::try_from(photos.len()).map_or(u32::MAX, |len| len.saturating_add(1))
}

fn photo_from(payload: PhotoPayload, sequence: u32) -> Option<Photo> {
    let Some(id) = payload.id.filter(|id| !id.is_empty()) else {
        warn!("session: dropping photo without id");
        return None;
    };
    let thumbnail_url = payload
        .thumbnail_url
        .clone()
        .or_else(|| payload.web_url.clone())
        .unwrap_or_default();
    let web_url = payload.web_url.or(payload.thumbnail_url).unwrap_or_default();
    Some(Photo { id, sequence, thumbnail_url, web_url })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
