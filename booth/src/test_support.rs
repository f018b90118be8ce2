//! In-process fake backend for transport and controller tests.
//!
//! Serves the `/api/v1` HTTP surface and the session WebSocket endpoints on
//! an ephemeral port. Each accepted socket follows the next scripted
//! [`SocketPlan`]; pushed events fan out to every open socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use wire::ServerEvent;

use crate::config::BoothConfig;

/// What the next accepted socket does.
#[derive(Clone, Copy, Debug)]
pub enum SocketPlan {
    /// Stay open, forward pushed events, answer pings.
    Serve,
    /// Drop the TCP connection without a close frame.
    Drop,
    /// Send a close frame with this code.
    Close(u16),
}

#[derive(Default)]
struct Shared {
    ws_connections: AtomicUsize,
    plans: Mutex<VecDeque<SocketPlan>>,
    received: Mutex<Vec<Value>>,
    sessions_created: AtomicUsize,
    create_response: Mutex<Option<(StatusCode, Value)>>,
    capture_response: Mutex<Option<(StatusCode, Value)>>,
    capture_delay: Mutex<Option<Duration>>,
    ended: Mutex<Vec<String>>,
    end_response: Mutex<Option<StatusCode>>,
}

pub struct FakeBackend {
    pub base_url: String,
    shared: Arc<Shared>,
    push: broadcast::Sender<String>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let (push, _) = broadcast::channel(64);

        let app = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
            .route("/api/v1/sessions", post(create_session))
            .route("/api/v1/sessions/wifi-qr", get(qr_image))
            .route("/api/v1/sessions/{id}", get(session_summary))
            .route("/api/v1/sessions/{id}/qr", get(qr_image))
            .route("/api/v1/sessions/{id}/capture", post(capture))
            .route("/api/v1/sessions/{id}/end", post(end_session))
            .route("/api/v1/ws/{role}/{id}", get(upgrade))
            .with_state(AppState { shared: shared.clone(), push: push.clone() });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url: format!("http://{addr}"), shared, push, server }
    }

    /// Config pointing at this backend with short timings.
    pub fn config(&self) -> BoothConfig {
        let mut config = BoothConfig::new(&self.base_url).expect("fake backend url");
        config.reconnect_delay = Duration::from_millis(100);
        config.heartbeat_interval = Duration::from_millis(100);
        config.error_display = Duration::from_millis(200);
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Script the behaviour of upcoming sockets, in accept order.
    pub fn plan_sockets(&self, plans: &[SocketPlan]) {
        self.shared.plans.lock().expect("plans").extend(plans.iter().copied());
    }

    pub fn ws_connections(&self) -> usize {
        self.shared.ws_connections.load(Ordering::SeqCst)
    }

    pub async fn wait_for_ws_connections(&self, count: usize) {
        for _ in 0..200 {
            if self.ws_connections() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} ws connections (saw {})", self.ws_connections());
    }

    /// Send an event to every open socket.
    pub fn push(&self, event: &ServerEvent) {
        let _ = self.push.send(wire::encode_event(event));
    }

    /// Send raw text to every open socket.
    pub fn push_raw(&self, text: &str) {
        let _ = self.push.send(text.to_owned());
    }

    /// Messages received from clients, in order.
    pub fn received(&self) -> Vec<Value> {
        self.shared.received.lock().expect("received").clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.shared.sessions_created.load(Ordering::SeqCst)
    }

    pub fn fail_create(&self, status: StatusCode, body: Value) {
        *self.shared.create_response.lock().expect("create") = Some((status, body));
    }

    pub fn fail_capture(&self, status: StatusCode, body: Value) {
        *self.shared.capture_response.lock().expect("capture") = Some((status, body));
    }

    pub fn delay_capture(&self, delay: Duration) {
        *self.shared.capture_delay.lock().expect("delay") = Some(delay);
    }

    pub fn fail_end(&self, status: StatusCode) {
        *self.shared.end_response.lock().expect("end") = Some(status);
    }

    pub fn ended(&self) -> Vec<String> {
        self.shared.ended.lock().expect("ended").clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[derive(Clone)]
struct AppState {
    shared: Arc<Shared>,
    push: broadcast::Sender<String>,
}

async fn create_session(State(state): State<AppState>) -> Response {
    if let Some((status, body)) = state.shared.create_response.lock().expect("create").clone() {
        return (status, Json(body)).into_response();
    }
    let n = state.shared.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
    let id = format!("session-{n}");
    Json(json!({
        "id": id,
        "uploadToken": "token",
        "galleryUrl": format!("/session/{id}"),
        "qrCodeUrl": format!("/api/v1/sessions/{id}/qr"),
        "wifiQrUrl": "/api/v1/sessions/wifi-qr",
    }))
    .into_response()
}

async fn session_summary(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Session not found"}))).into_response();
    }
    Json(json!({
        "id": id,
        "createdAt": "2026-10-16T10:00:00Z",
        "expiresAt": "2026-10-16T11:00:00Z",
        "status": "active",
        "photoCount": 2,
        "kioskConnected": true,
        "phoneConnected": false,
    }))
    .into_response()
}

async fn qr_image() -> Response {
    ([("content-type", "image/png")], vec![0x89_u8, b'P', b'N', b'G']).into_response()
}

async fn capture(State(state): State<AppState>, Path(_id): Path<String>) -> Response {
    let delay = *state.shared.capture_delay.lock().expect("delay");
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some((status, body)) = state.shared.capture_response.lock().expect("capture").clone() {
        return (status, Json(body)).into_response();
    }
    Json(json!({"photos": []})).into_response()
}

async fn end_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state.shared.ended.lock().expect("ended").push(id.clone());
    if let Some(status) = *state.shared.end_response.lock().expect("end") {
        return (status, Json(json!({"detail": "end failed"}))).into_response();
    }
    Json(json!({"id": id, "status": "completed"})).into_response()
}

async fn upgrade(
    State(state): State<AppState>,
    Path((_role, _id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, state))
}

async fn run_socket(mut socket: WebSocket, state: AppState) {
    let plan = state
        .shared
        .plans
        .lock()
        .expect("plans")
        .pop_front()
        .unwrap_or(SocketPlan::Serve);
    let mut pushed = state.push.subscribe();
    state.shared.ws_connections.fetch_add(1, Ordering::SeqCst);

    match plan {
        SocketPlan::Drop => return,
        SocketPlan::Close(code) => {
            let frame = CloseFrame { code, reason: "scripted".into() };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
        SocketPlan::Serve => {}
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else { continue };
                        let is_ping = value.get("type").and_then(Value::as_str) == Some("ping");
                        state.shared.received.lock().expect("received").push(value);
                        if is_ping {
                            let pong = wire::encode_event(&ServerEvent::Pong);
                            if socket.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Ok(text) = pushed.recv() => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}
