//! Minimal demo bootstrap: loads configuration, connects over WebSocket,
//! registers a device, and subscribes for commands.

use std::sync::Arc;

use devicehive::{load_config_from_path, Command, Device, DeviceHiveError, DeviceService, DeviceServiceEvents, WebSocketDeviceService};
use tracing::info;

struct LoggingEvents;

#[async_trait::async_trait]
impl DeviceServiceEvents for LoggingEvents {
    async fn on_connected(&self, err: Option<DeviceHiveError>) {
        match err {
            None => info!("connected"),
            Some(e) => tracing::error!(error = %e, "connect failed"),
        }
    }

    async fn on_insert_command(&self, _err: Option<DeviceHiveError>, device: Arc<Device>, command: Command) {
        info!(device = %device.id, command = %command.name, "command received");
    }

    async fn on_action_received(&self, err: Option<DeviceHiveError>) {
        if let Some(e) = err {
            tracing::warn!(error = %e, "liveness monitor gave up on the connection");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "devicehive client starting");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "devicehive.toml".to_owned());
    let cfg = match load_config_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let events: Arc<dyn DeviceServiceEvents> = Arc::new(LoggingEvents);
    let service = WebSocketDeviceService::new(
        cfg.server_url.clone(),
        cfg.device_id.clone(),
        cfg.device_key.clone(),
        cfg.request_timeout,
        cfg.liveness,
        events,
    );

    if let Err(e) = service.connect().await {
        eprintln!("FATAL: failed to connect: {e}");
        std::process::exit(1);
    }

    let device = Arc::new(Device::new(cfg.device_id.clone(), cfg.device_key.clone(), "demo device"));
    if let Err(e) = service.register_device(Arc::clone(&device)).await {
        tracing::warn!(error = %e, "register_device failed");
    }
    if let Err(e) = service.subscribe_for_commands(device, None).await {
        tracing::warn!(error = %e, "subscribe_for_commands failed");
    }

    tokio::signal::ctrl_c().await.ok();
    service.cancel_all().await;
}
