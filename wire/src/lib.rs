//! Shared message model and JSON codec for the booth WebSocket protocol.
//!
//! Every message in either direction is an envelope `{"type": ..., "data": ...}`
//! where `type` is the discriminant. The backend has shipped two variants of
//! the capture events (with and without per-photo progress fields and a
//! separate `processing` event), so every payload field is optional and
//! consumers fall back to neutral defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode`] and [`ServerEvent::from_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not JSON or has no string `type` field.
    #[error("invalid message envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// A recognized message kind carried a payload of the wrong shape.
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Untyped wire envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// =============================================================================
// SERVER -> CLIENT PAYLOADS
// =============================================================================

/// `session_ready`: a session exists and can be joined.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub qr_url: Option<String>,
    pub wifi_qr_url: Option<String>,
}

/// `session_state`: snapshot sent to a phone right after it joins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub phone_id: Option<String>,
    pub photos: Vec<PhotoPayload>,
    pub kiosk_connected: Option<bool>,
}

/// `kiosk_connected`: greeting sent to the kiosk after it joins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KioskPresence {
    pub session_id: Option<String>,
    pub phone_count: Option<u32>,
}

/// `phone_connected` / `phone_disconnected`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhonePresence {
    pub session_id: Option<String>,
    pub phone_id: Option<String>,
}

/// `countdown`: one tick before a shot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Countdown {
    pub value: Option<u32>,
    pub session_id: Option<String>,
    pub photo_number: Option<u32>,
    pub total_photos: Option<u32>,
}

/// `capture_start`: the shutter is about to fire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureProgress {
    pub session_id: Option<String>,
    pub photo_number: Option<u32>,
    pub total_photos: Option<u32>,
}

/// `processing`: every shot is taken, renditions are still being produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingInfo {
    pub session_id: Option<String>,
    pub photo_count: Option<u32>,
}

/// `photo_ready`, and the entries of a [`SessionSnapshot`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhotoPayload {
    pub id: Option<String>,
    pub session_id: Option<String>,
    pub sequence: Option<u32>,
    pub web_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// `photo_failed`: one shot of a sequence failed, the rest continue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhotoFailure {
    pub session_id: Option<String>,
    pub photo_number: Option<u32>,
    pub error: Option<String>,
}

/// `capture_complete`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSummary {
    pub session_id: Option<String>,
    pub photo_count: Option<u32>,
    pub strip_url: Option<String>,
}

/// `capture_failed` and `error`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Failure {
    pub session_id: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl Failure {
    /// Human-readable reason, preferring `error` over `message`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

/// `session_ended`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionEnded {
    pub session_id: Option<String>,
}

// =============================================================================
// SERVER EVENTS
// =============================================================================

/// A decoded server-to-client message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    SessionReady(SessionInfo),
    SessionState(SessionSnapshot),
    KioskConnected(KioskPresence),
    PhoneConnected(PhonePresence),
    PhoneDisconnected(PhonePresence),
    Countdown(Countdown),
    CaptureStart(CaptureProgress),
    Processing(ProcessingInfo),
    PhotoReady(PhotoPayload),
    PhotoFailed(PhotoFailure),
    CaptureComplete(CaptureSummary),
    CaptureFailed(Failure),
    SessionEnded(SessionEnded),
    Error(Failure),
    /// Heartbeat reply. Consumed by the transport, never shown to state.
    Pong,
}

impl ServerEvent {
    /// Wire discriminant for this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionReady(_) => "session_ready",
            Self::SessionState(_) => "session_state",
            Self::KioskConnected(_) => "kiosk_connected",
            Self::PhoneConnected(_) => "phone_connected",
            Self::PhoneDisconnected(_) => "phone_disconnected",
            Self::Countdown(_) => "countdown",
            Self::CaptureStart(_) => "capture_start",
            Self::Processing(_) => "processing",
            Self::PhotoReady(_) => "photo_ready",
            Self::PhotoFailed(_) => "photo_failed",
            Self::CaptureComplete(_) => "capture_complete",
            Self::CaptureFailed(_) => "capture_failed",
            Self::SessionEnded(_) => "session_ended",
            Self::Error(_) => "error",
            Self::Pong => "pong",
        }
    }

    /// Type an envelope.
    ///
    /// Returns `Ok(None)` for kinds this client does not know, so newer
    /// backends can add events without breaking older clients.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Payload`] when a known kind carries a payload
    /// that does not fit its shape.
    pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>, CodecError> {
        let Envelope { kind, data } = envelope;
        let event = match kind.as_str() {
            "session_ready" => Self::SessionReady(payload(&kind, data)?),
            "session_state" => Self::SessionState(payload(&kind, data)?),
            "kiosk_connected" => Self::KioskConnected(payload(&kind, data)?),
            "phone_connected" => Self::PhoneConnected(payload(&kind, data)?),
            "phone_disconnected" => Self::PhoneDisconnected(payload(&kind, data)?),
            "countdown" => Self::Countdown(payload(&kind, data)?),
            "capture_start" => Self::CaptureStart(payload(&kind, data)?),
            "processing" => Self::Processing(payload(&kind, data)?),
            "photo_ready" => Self::PhotoReady(payload(&kind, data)?),
            "photo_failed" => Self::PhotoFailed(payload(&kind, data)?),
            "capture_complete" => Self::CaptureComplete(payload(&kind, data)?),
            "capture_failed" => Self::CaptureFailed(payload(&kind, data)?),
            "session_ended" => Self::SessionEnded(payload(&kind, data)?),
            "error" => Self::Error(payload(&kind, data)?),
            "pong" => Self::Pong,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Build the envelope this event travels in.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            Self::SessionReady(p) => to_data(p),
            Self::SessionState(p) => to_data(p),
            Self::KioskConnected(p) => to_data(p),
            Self::PhoneConnected(p) | Self::PhoneDisconnected(p) => to_data(p),
            Self::Countdown(p) => to_data(p),
            Self::CaptureStart(p) => to_data(p),
            Self::Processing(p) => to_data(p),
            Self::PhotoReady(p) => to_data(p),
            Self::PhotoFailed(p) => to_data(p),
            Self::CaptureComplete(p) => to_data(p),
            Self::CaptureFailed(p) | Self::Error(p) => to_data(p),
            Self::SessionEnded(p) => to_data(p),
            Self::Pong => None,
        };
        Envelope { kind: self.kind().to_owned(), data }
    }
}

fn payload<T: DeserializeOwned + Default>(kind: &str, data: Option<Value>) -> Result<T, CodecError> {
    match data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|source| CodecError::Payload {
            kind: kind.to_owned(),
            source,
        }),
    }
}

fn to_data<T: Serialize>(payload: &T) -> Option<Value> {
    serde_json::to_value(payload).ok()
}

/// Decode one text frame into a typed event.
///
/// # Errors
///
/// Returns [`CodecError::Envelope`] for text that is not an envelope and
/// [`CodecError::Payload`] for a known kind with a malformed payload.
pub fn decode(text: &str) -> Result<Option<ServerEvent>, CodecError> {
    let envelope = serde_json::from_str::<Envelope>(text).map_err(CodecError::Envelope)?;
    ServerEvent::from_envelope(envelope)
}

/// Encode a server event as envelope JSON.
#[must_use]
pub fn encode_event(event: &ServerEvent) -> String {
    // Envelopes hold only strings, numbers, and JSON values, so this cannot fail.
    serde_json::to_string(&event.to_envelope()).unwrap_or_default()
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// A client-to-server message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    NewSession,
    StartCapture,
    EndSession,
    JoinSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    DownloadPhoto {
        #[serde(rename = "photoId")]
        photo_id: String,
    },
    Ping,
}

impl ClientMessage {
    /// Wire discriminant for this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewSession => "new_session",
            Self::StartCapture => "start_capture",
            Self::EndSession => "end_session",
            Self::JoinSession { .. } => "join_session",
            Self::DownloadPhoto { .. } => "download_photo",
            Self::Ping => "ping",
        }
    }
}

/// Encode a client message as envelope JSON. Unit variants omit `data`.
#[must_use]
pub fn encode(message: &ClientMessage) -> String {
    // Plain strings only; serialization is infallible for this type.
    serde_json::to_string(message).unwrap_or_default()
}

// =============================================================================
// CLOSE CODES
// =============================================================================

/// Why a socket closed, as agreed between clients and the backend.
///
/// Terminal reasons mean the session is gone or the close was deliberate;
/// a client must not reconnect. Everything else is worth one retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// 1000, deliberate close.
    Normal,
    /// 4001, the session has already completed.
    SessionCompleted,
    /// 4004, no such session.
    SessionNotFound,
    /// 1006, the connection dropped without a close frame.
    Abnormal,
    /// Any other code.
    Other(u16),
}

impl CloseReason {
    pub const NORMAL_CODE: u16 = 1000;
    pub const ABNORMAL_CODE: u16 = 1006;
    pub const SESSION_COMPLETED_CODE: u16 = 4001;
    pub const SESSION_NOT_FOUND_CODE: u16 = 4004;

    /// Classify a close code. `None` means no close frame was received.
    #[must_use]
    pub fn from_code(code: Option<u16>) -> Self {
        match code {
            None | Some(Self::ABNORMAL_CODE) => Self::Abnormal,
            Some(Self::NORMAL_CODE) => Self::Normal,
            Some(Self::SESSION_COMPLETED_CODE) => Self::SessionCompleted,
            Some(Self::SESSION_NOT_FOUND_CODE) => Self::SessionNotFound,
            Some(other) => Self::Other(other),
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => Self::NORMAL_CODE,
            Self::SessionCompleted => Self::SESSION_COMPLETED_CODE,
            Self::SessionNotFound => Self::SESSION_NOT_FOUND_CODE,
            Self::Abnormal => Self::ABNORMAL_CODE,
            Self::Other(code) => code,
        }
    }

    /// Whether a client must stay disconnected after this close.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Normal | Self::SessionCompleted | Self::SessionNotFound)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
