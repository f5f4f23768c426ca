//! Integration tests for [`HttpDeviceService`] against a mock DeviceHive
//! REST server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devicehive::{Command, Device, DeviceHiveError, DeviceService, DeviceServiceEvents, HttpDeviceService};
use devicehive_test_support::MockHttpServer;
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingEvents {
    registered: Mutex<Option<Arc<Device>>>,
    commands: Mutex<Vec<Command>>,
}

#[async_trait]
impl DeviceServiceEvents for RecordingEvents {
    async fn on_register_device(&self, _err: Option<DeviceHiveError>, device: Arc<Device>) {
        *self.registered.lock().await = Some(device);
    }

    async fn on_insert_command(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>, command: Command) {
        self.commands.lock().await.push(command);
    }
}

#[tokio::test]
async fn register_device_absorbs_server_fields_and_keeps_local_key() {
    let server = MockHttpServer::start().await.unwrap();
    let events = Arc::new(RecordingEvents::default());
    let service = HttpDeviceService::new(server.base_url(), Duration::from_secs(5), Arc::clone(&events) as Arc<dyn DeviceServiceEvents>);

    let device = Arc::new(Device::new("d1", "k1", "my device"));
    service.register_device(device).await.expect("register_device");

    let registered = events.registered.lock().await.clone().expect("on_register_device fired");
    assert_eq!(registered.key, "k1", "local secret key must survive the merge");
    assert_eq!(registered.id.as_str(), "d1");
    assert_eq!(registered.name, "X");
    assert_eq!(registered.status, "online");
    assert_eq!(registered.network.as_ref().unwrap().id, 7);
}

#[tokio::test]
async fn connect_succeeds_against_info_endpoint() {
    let server = MockHttpServer::start().await.unwrap();
    let events: Arc<dyn DeviceServiceEvents> = Arc::new(RecordingEvents::default());
    let service = HttpDeviceService::new(server.base_url(), Duration::from_secs(5), events);
    service.connect().await.expect("connect");
}

#[tokio::test]
async fn subscribe_for_commands_delivers_queued_command_once() {
    let server = MockHttpServer::start().await.unwrap();
    let events = Arc::new(RecordingEvents::default());
    let service = HttpDeviceService::new(server.base_url(), Duration::from_secs(5), Arc::clone(&events) as Arc<dyn DeviceServiceEvents>);

    let device = Arc::new(Device::new("d1", "k1", "my device"));
    server.enqueue_command(
        "d1",
        json!({
            "id": 1,
            "command": "reboot",
            "parameters": {},
            "timestamp": "2020-01-01T00:00:00Z",
            "lifetime": 0,
            "flags": 0,
            "status": "",
            "result": null,
        }),
    );

    service.subscribe_for_commands(Arc::clone(&device), None).await.expect("subscribe");

    for _ in 0..50 {
        if !events.commands.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    service.unsubscribe_from_commands(device).await.expect("unsubscribe");

    let commands = events.commands.lock().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].id, 1);
}

#[tokio::test]
async fn insert_notification_reaches_server() {
    let server = MockHttpServer::start().await.unwrap();
    let events: Arc<dyn DeviceServiceEvents> = Arc::new(RecordingEvents::default());
    let service = HttpDeviceService::new(server.base_url(), Duration::from_secs(5), events);

    let device = Arc::new(Device::new("d1", "k1", "my device"));
    let notification = devicehive::Notification::new("temperature", json!({"value": 21.5}));
    service.insert_notification(device, notification).await.expect("insert_notification");

    let received = server.notifications_received("d1");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["notification"], "temperature");
}
