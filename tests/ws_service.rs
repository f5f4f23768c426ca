//! Integration tests for [`WebSocketDeviceService`] against a mock
//! DeviceHive WebSocket server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devicehive::{Command, Device, DeviceHiveError, DeviceService, DeviceServiceEvents, LivenessConfig, WebSocketDeviceService};
use devicehive_test_support::MockWsServer;
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingEvents {
    commands: Mutex<Vec<Command>>,
    connected: AtomicBool,
}

#[async_trait]
impl DeviceServiceEvents for RecordingEvents {
    async fn on_connected(&self, err: Option<DeviceHiveError>) {
        self.connected.store(err.is_none(), Ordering::SeqCst);
    }

    async fn on_insert_command(&self, _err: Option<DeviceHiveError>, _device: Arc<Device>, command: Command) {
        self.commands.lock().await.push(command);
    }
}

#[tokio::test]
async fn subscribe_then_receive_pushed_command() {
    let server = MockWsServer::start().await.unwrap();
    let events = Arc::new(RecordingEvents::default());
    let service = WebSocketDeviceService::new(
        server.url(),
        "client-device",
        "client-key",
        Duration::from_secs(5),
        LivenessConfig { enabled: false, ..Default::default() },
        Arc::clone(&events) as Arc<dyn DeviceServiceEvents>,
    );

    service.connect().await.expect("connect");
    assert!(events.connected.load(Ordering::SeqCst));

    let device = Arc::new(Device::new("d1", "k1", "device one"));
    service
        .subscribe_for_commands(Arc::clone(&device), None)
        .await
        .expect("subscribe");

    server.push(json!({
        "action": "command/insert",
        "deviceGuid": "d1",
        "command": {
            "id": 42,
            "command": "reboot",
            "parameters": {},
            "timestamp": "2020-01-01T00:00:00Z",
            "lifetime": 0,
            "flags": 0,
            "status": "",
            "result": null,
        }
    }));

    for _ in 0..50 {
        if !events.commands.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let commands = events.commands.lock().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].id, 42);
    assert_eq!(commands[0].name, "reboot");
}

#[tokio::test]
async fn register_device_round_trips_through_mock_server() {
    let server = MockWsServer::start().await.unwrap();
    let events = Arc::new(RecordingEvents::default());
    let service = WebSocketDeviceService::new(
        server.url(),
        "client-device",
        "client-key",
        Duration::from_secs(5),
        LivenessConfig { enabled: false, ..Default::default() },
        events as Arc<dyn DeviceServiceEvents>,
    );

    service.connect().await.expect("connect");
    let device = Arc::new(Device::new("d1", "k1", "device one"));
    service.register_device(device).await.expect("register_device");
}

#[tokio::test]
async fn cancel_all_resolves_outstanding_request_as_cancelled() {
    // A server that never replies leaves register_device outstanding until
    // cancel_all tears the connection down.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _ws = tokio_tungstenite::accept_async(stream).await;
            // Deliberately never read or write again.
            std::future::pending::<()>().await;
        }
    });

    let events: Arc<dyn DeviceServiceEvents> = Arc::new(RecordingEvents::default());
    let service = Arc::new(WebSocketDeviceService::new(
        format!("ws://{addr}"),
        "client-device",
        "client-key",
        Duration::from_secs(30),
        LivenessConfig { enabled: false, ..Default::default() },
        events,
    ));

    service.connect().await.expect("connect");

    let svc = Arc::clone(&service);
    let device = Arc::new(Device::new("d1", "k1", "device one"));
    let pending = tokio::spawn(async move { svc.register_device(device).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    service.cancel_all().await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DeviceHiveError::Cancelled)));
}
