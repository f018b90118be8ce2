//! Client-side protocol core for the photo booth.
//!
//! Both client roles share the same pieces: a [`transport::Transport`] that
//! keeps one WebSocket open per role, a [`session::SessionState`] that folds
//! pushed events into what a screen shows, and an [`api::ApiClient`] for the
//! HTTP commands. [`kiosk::Kiosk`] and [`phone::Phone`] wire them together.

pub mod api;
pub mod config;
pub mod kiosk;
pub mod phone;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, CreatedSession, SessionSummary};
pub use config::{BoothConfig, ConfigError};
pub use kiosk::{Intent, Kiosk, Update};
pub use phone::{Phone, PhoneUpdate};
pub use session::{Effect, ErrorBanner, Lifecycle, Photo, Screen, SessionState};
pub use transport::{ConnectionStatus, EventStream, Role, Transport};
