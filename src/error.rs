//! Crate-wide error type. Every public async operation resolves with
//! `Result<_, DeviceHiveError>` — no transport or protocol failure tunnels
//! across an `.await` boundary as anything other than a value.

use devicehive_protocol::TransceiverError;

/// Wraps the three external collaborator error types this crate crosses:
/// the HTTP client, the WebSocket engine, and the JSON codec.
#[derive(Debug, thiserror::Error)]
pub enum TransportErrorSource {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary transport error: {0}")]
    Binary(#[from] TransceiverError),
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceHiveError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportErrorSource),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    Timeout,
    #[error("protocol fault: {0}")]
    ProtocolFault(String),
    #[error("bad frame checksum")]
    BadChecksum,
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for DeviceHiveError {
    fn from(e: reqwest::Error) -> Self {
        DeviceHiveError::Transport(TransportErrorSource::Http(e))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DeviceHiveError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        DeviceHiveError::Transport(TransportErrorSource::WebSocket(e))
    }
}

impl From<serde_json::Error> for DeviceHiveError {
    fn from(e: serde_json::Error) -> Self {
        DeviceHiveError::Transport(TransportErrorSource::Json(e))
    }
}

impl From<TransceiverError> for DeviceHiveError {
    fn from(e: TransceiverError) -> Self {
        DeviceHiveError::Transport(TransportErrorSource::Binary(e))
    }
}
