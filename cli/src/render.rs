//! Operator input parsing and one-line status rendering.

use booth::{ConnectionStatus, Intent, Screen, SessionState};

/// A line typed at the kiosk prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum KioskInput {
    Intent(Intent),
    Quit,
    Unknown(String),
}

/// A line typed at the phone prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum PhoneInput {
    Download(String),
    Quit,
    Unknown(String),
}

pub fn parse_kiosk_input(line: &str) -> Option<KioskInput> {
    let word = line.trim();
    if word.is_empty() {
        return None;
    }
    Some(match word.to_ascii_lowercase().as_str() {
        "start" | "new" => KioskInput::Intent(Intent::StartSession),
        "capture" | "c" => KioskInput::Intent(Intent::Capture),
        "end" => KioskInput::Intent(Intent::EndSession),
        "quit" | "exit" | "q" => KioskInput::Quit,
        _ => KioskInput::Unknown(word.to_owned()),
    })
}

pub fn parse_phone_input(line: &str) -> Option<PhoneInput> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    Some(match (command.to_ascii_lowercase().as_str(), parts.next()) {
        ("download" | "d", Some(photo_id)) => PhoneInput::Download(photo_id.to_owned()),
        ("quit" | "exit" | "q", None) => PhoneInput::Quit,
        _ => PhoneInput::Unknown(line.trim().to_owned()),
    })
}

pub fn screen_label(screen: Screen) -> String {
    match screen {
        Screen::NoSession => "no-session".to_owned(),
        Screen::Waiting => "waiting".to_owned(),
        Screen::CountingDown(value) => format!("countdown {value}"),
        Screen::Processing => "processing".to_owned(),
        Screen::Photos => "photos".to_owned(),
    }
}

fn connection_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
    }
}

/// `[screen] session=... ws=... phones=N photos=N [shot a/b] [error="..."]`
pub fn status_line(state: &SessionState, connection: ConnectionStatus) -> String {
    let mut line = format!(
        "[{}] session={} ws={} phones={} photos={}",
        screen_label(state.screen()),
        state.session_id().unwrap_or("-"),
        connection_label(connection),
        state.phone_count(),
        state.photos().len(),
    );
    if state.is_capturing() {
        if let Some(number) = state.photo_number() {
            line.push_str(&format!(" shot {number}/{}", state.total_photos()));
        }
    }
    if let Some(strip) = state.strip_url() {
        line.push_str(&format!(" strip={strip}"));
    }
    if let Some(banner) = state.error() {
        line.push_str(&format!(" error={:?}", banner.message));
    }
    line
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
