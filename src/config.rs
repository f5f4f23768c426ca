//! Configuration loading for an embedding application: connection
//! parameters and liveness/timeout tuning, loaded from TOML.
//!
//! Grounded on the Raw/validated two-struct split in
//! `services/forwarder/src/config.rs`: a `RawDeviceHiveConfig` where every
//! field is optional (so a partial file deserializes fine), validated and
//! defaulted into a `DeviceHiveConfig` the rest of the crate uses.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::liveness::LivenessConfig;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PONG_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PING_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Deserialize)]
struct RawDeviceHiveConfig {
    server_url: Option<String>,
    device_id: Option<String>,
    device_key: Option<String>,
    request_timeout_secs: Option<u64>,
    idle_timeout_ms: Option<u64>,
    pong_timeout_ms: Option<u64>,
    ping_retry_limit: Option<u32>,
    max_queued_frames: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DeviceHiveConfig {
    pub server_url: String,
    pub device_id: String,
    pub device_key: String,
    pub request_timeout: Duration,
    pub liveness: LivenessConfig,
    pub max_queued_frames: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    MissingField(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {e}"),
            ConfigError::MissingField(name) => write!(f, "missing required field: {name}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<DeviceHiveConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    load_config_from_str(&contents)
}

pub fn load_config_from_str(contents: &str) -> Result<DeviceHiveConfig, ConfigError> {
    let raw: RawDeviceHiveConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;
    validate(raw)
}

fn validate(raw: RawDeviceHiveConfig) -> Result<DeviceHiveConfig, ConfigError> {
    let server_url = raw.server_url.ok_or(ConfigError::MissingField("server_url"))?;
    let device_id = raw.device_id.ok_or(ConfigError::MissingField("device_id"))?;
    let device_key = raw.device_key.ok_or(ConfigError::MissingField("device_key"))?;

    let request_timeout = Duration::from_secs(
        raw.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
    );
    let liveness = LivenessConfig {
        idle_timeout: Duration::from_millis(raw.idle_timeout_ms.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS)),
        pong_timeout: Duration::from_millis(raw.pong_timeout_ms.unwrap_or(DEFAULT_PONG_TIMEOUT_MS)),
        retry_limit: raw.ping_retry_limit.unwrap_or(DEFAULT_PING_RETRY_LIMIT),
        enabled: true,
    };

    Ok(DeviceHiveConfig {
        server_url,
        device_id,
        device_key,
        request_timeout,
        liveness,
        max_queued_frames: raw.max_queued_frames,
    })
}
