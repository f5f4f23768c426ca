//! A mock DeviceHive REST server for testing [`HttpDeviceService`]-style
//! clients against `/info`, `/device/{id}`, and the command poll/update
//! endpoints, without a real DeviceHive deployment.
//!
//! Grounded on the `axum::Router` + `State` shape the server service uses
//! for its HTTP surface, with an in-memory `Mutex` standing in for the
//! database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
struct Inner {
    devices: HashMap<String, Value>,
    pending_commands: HashMap<String, Vec<Value>>,
    received_notifications: Vec<Value>,
}

#[derive(Clone, Default)]
struct AppState(Arc<Mutex<Inner>>);

/// A mock DeviceHive REST server for integration testing.
pub struct MockHttpServer {
    addr: std::net::SocketAddr,
    state: AppState,
    _task: tokio::task::JoinHandle<()>,
}

impl MockHttpServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let state = AppState::default();
        let app = Router::new()
            .route("/info", get(info))
            .route("/device/{id}", put(save_device).get(get_device))
            .route("/device/{id}/command/poll", get(poll_commands))
            .route("/device/{id}/command/{cmd_id}", put(update_command))
            .route("/device/{id}/notification", post(insert_notification))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, state, _task: task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a command the next poll for `device_id` will return.
    pub fn enqueue_command(&self, device_id: &str, command: Value) {
        self.state
            .0
            .lock()
            .unwrap()
            .pending_commands
            .entry(device_id.to_owned())
            .or_default()
            .push(command);
    }

    pub fn notifications_received(&self, device_id: &str) -> Vec<Value> {
        self.state
            .0
            .lock()
            .unwrap()
            .received_notifications
            .iter()
            .filter(|n| n.get("deviceId").and_then(Value::as_str) == Some(device_id))
            .cloned()
            .collect()
    }
}

async fn info() -> impl IntoResponse {
    Json(json!({
        "apiVersion": "8.4.0",
        "serverTimestamp": "2026-01-01T00:00:00Z",
        "restServerUrl": Value::Null,
    }))
}

async fn save_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(_body): Json<Value>,
) -> impl IntoResponse {
    // Mirrors a server that fills in fields the device doesn't know about
    // yet (display name, status, network membership, device class) while
    // leaving the secret key for the caller to preserve locally.
    let response = json!({
        "id": id,
        "name": "X",
        "status": "online",
        "network": {"id": 7, "name": "n", "description": ""},
        "deviceClass": {
            "id": 3, "name": "c", "version": "1",
            "isPermanent": false, "offlineTimeout": 0,
        },
    });
    state.0.lock().unwrap().devices.insert(id, response.clone());
    (StatusCode::OK, Json(response))
}

async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.0.lock().unwrap().devices.get(&id).cloned() {
        Some(device) => (StatusCode::OK, Json(device)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn poll_commands(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(_params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let commands = state.0.lock().unwrap().pending_commands.remove(&id).unwrap_or_default();
    Json(commands)
}

async fn update_command(
    State(_state): State<AppState>,
    Path((_id, _cmd_id)): Path<(String, String)>,
    Json(_body): Json<Value>,
) -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn insert_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> impl IntoResponse {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("deviceId".to_owned(), json!(id));
    }
    state.0.lock().unwrap().received_notifications.push(body);
    StatusCode::CREATED
}
