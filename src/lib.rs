//! Device-side client library for the DeviceHive IoT cloud platform: the
//! device↔cloud session layer shared by the HTTP and WebSocket transports.

pub mod config;
pub mod correlator;
pub mod entities;
pub mod error;
pub mod events;
pub mod http_service;
pub mod liveness;
pub mod ws_service;

pub use config::{load_config_from_path, load_config_from_str, DeviceHiveConfig};
pub use entities::{Command, Device, DeviceClass, DeviceGuid, Equipment, Network, Notification, ServerInfo};
pub use error::DeviceHiveError;
pub use events::{DeviceService, DeviceServiceEvents};
pub use http_service::HttpDeviceService;
pub use liveness::{LivenessConfig, LivenessMonitor};
pub use ws_service::WebSocketDeviceService;
