//! The observable contract applications implement to receive unsolicited
//! server traffic and lifecycle notifications, and the common surface both
//! transports expose.
//!
//! Grounded on `IDeviceServiceEvents`/`IDeviceService` in
//! `original_source/include/DeviceHive/service.hpp`: every callback there
//! has a default no-op implementation, so an application only overrides the
//! handful it cares about.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::{Command, Device, Notification, ServerInfo};
use crate::error::DeviceHiveError;

/// Unsolicited events pushed from the service to the application.
///
/// The service holds this behind an `Arc`, so it does not control the
/// sink's lifetime — the application drops it (or drops the service) to
/// tear things down, matching the "non-owning reference between service
/// and app callbacks" guidance.
#[async_trait]
pub trait DeviceServiceEvents: Send + Sync {
    async fn on_connected(&self, _err: Option<DeviceHiveError>) {}
    async fn on_server_info(&self, _err: Option<DeviceHiveError>, _info: Option<ServerInfo>) {}
    async fn on_register_device(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>) {}
    async fn on_get_device_data(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>) {}
    async fn on_update_device_data(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>) {}
    async fn on_insert_command(
        &self,
        _err: Option<DeviceHiveError>,
        _device: Arc<Device>,
        _command: Command,
    ) {
    }
    async fn on_update_command(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>) {}
    async fn on_insert_notification(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>) {}

    /// Fired when the WebSocket liveness monitor gives up on an unresponsive
    /// peer (§4.7). There is no per-operation counterpart for this failure —
    /// it isn't the reply to anything the application sent — so it surfaces
    /// here exactly once, carrying `DeviceHiveError::Timeout`, before the
    /// connection is force-closed.
    async fn on_action_received(&self, _err: Option<DeviceHiveError>) {}
}

/// The operations both transports implement identically from the
/// application's point of view.
#[async_trait]
pub trait DeviceService: Send + Sync {
    async fn connect(&self) -> Result<(), DeviceHiveError>;
    async fn get_server_info(&self) -> Result<ServerInfo, DeviceHiveError>;
    async fn register_device(&self, device: Arc<Device>) -> Result<(), DeviceHiveError>;
    async fn get_device_data(&self, device: Arc<Device>) -> Result<(), DeviceHiveError>;
    async fn update_device_data(&self, device: Arc<Device>) -> Result<(), DeviceHiveError>;
    async fn subscribe_for_commands(
        &self,
        device: Arc<Device>,
        timestamp: Option<String>,
    ) -> Result<(), DeviceHiveError>;
    async fn unsubscribe_from_commands(&self, device: Arc<Device>) -> Result<(), DeviceHiveError>;
    async fn update_command(
        &self,
        device: Arc<Device>,
        command: Command,
    ) -> Result<(), DeviceHiveError>;
    async fn insert_notification(
        &self,
        device: Arc<Device>,
        notification: Notification,
    ) -> Result<(), DeviceHiveError>;
    async fn cancel_all(&self);
}
