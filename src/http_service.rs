//! HTTP transport for the device service contract: REST calls plus a
//! long-poll loop standing in for a subscription.
//!
//! Grounded on `original_source/include/DeviceHive/cloud6.hpp`'s
//! `ServerAPI` class (`asyncRegisterDevice`, `asyncPollCommands`,
//! `asyncSendCommandResult`) and on `services/receiver/src/session.rs`'s
//! `watch::Receiver<bool>` shutdown-signal pattern for stopping a
//! long-running loop cleanly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entities::{Command, Device, DeviceGuid, Notification, ServerInfo};
use crate::error::DeviceHiveError;
use crate::events::{DeviceService, DeviceServiceEvents};

struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct HttpDeviceService {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    events: Arc<dyn DeviceServiceEvents>,
    polls: Mutex<HashMap<DeviceGuid, PollHandle>>,
}

impl HttpDeviceService {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration, events: Arc<dyn DeviceServiceEvents>) -> Self {
        HttpDeviceService {
            client: Client::new(),
            base_url: base_url.into(),
            request_timeout,
            events,
            polls: Mutex::new(HashMap::new()),
        }
    }

    fn device_url(&self, device: &Device) -> String {
        format!("{}/device/{}", self.base_url, device.id)
    }

    async fn fetch_server_info(&self) -> Result<ServerInfo, DeviceHiveError> {
        let resp = self
            .client
            .get(format!("{}/info", self.base_url))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let info: ServerInfo = resp.error_for_status()?.json().await?;
        Ok(info)
    }

    async fn poll_once(
        client: &Client,
        base_url: &str,
        device: &Device,
        timeout: Duration,
        last_timestamp: &Option<String>,
    ) -> Result<Vec<Command>, DeviceHiveError> {
        let mut url = format!("{base_url}/device/{}/command/poll", device.id);
        if let Some(ts) = last_timestamp {
            url.push_str("?timestamp=");
            url.push_str(ts);
        }
        let resp = client
            .get(url)
            .timeout(timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .send()
            .await?;
        let commands: Vec<Command> = resp.error_for_status()?.json().await?;
        Ok(commands)
    }

}

fn max_timestamp(current: &Option<String>, candidate: &str) -> Option<String> {
    match current {
        Some(cur) if cur.as_str() >= candidate => None,
        _ => Some(candidate.to_owned()),
    }
}

#[async_trait]
impl DeviceService for HttpDeviceService {
    async fn connect(&self) -> Result<(), DeviceHiveError> {
        match self.fetch_server_info().await {
            Ok(_) => {
                self.events.on_connected(None).await;
                Ok(())
            }
            Err(err) => {
                self.events.on_connected(Some(clone_err(&err))).await;
                Err(err)
            }
        }
    }

    async fn get_server_info(&self) -> Result<ServerInfo, DeviceHiveError> {
        match self.fetch_server_info().await {
            Ok(info) => {
                self.events.on_server_info(None, Some(info.clone())).await;
                Ok(info)
            }
            Err(err) => {
                self.events.on_server_info(Some(clone_err(&err)), None).await;
                Err(err)
            }
        }
    }

    async fn register_device(&self, device: Arc<Device>) -> Result<(), DeviceHiveError> {
        let url = self.device_url(&device);
        let body = serde_json::json!({
            "key": device.key,
            "status": device.status,
            "equipment": device.equipment,
        });
        let result = self
            .client
            .put(&url)
            .timeout(self.request_timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(json) => {
                        let merged = merge_device_response(&device, json);
                        self.events.on_register_device(None, Arc::new(merged)).await;
                        Ok(())
                    }
                    Err(e) => {
                        let err = DeviceHiveError::from(e);
                        self.events.on_register_device(Some(clone_err(&err)), device).await;
                        Err(err)
                    }
                },
                Err(e) => {
                    let err = DeviceHiveError::from(e);
                    self.events.on_register_device(Some(clone_err(&err)), device).await;
                    Err(err)
                }
            },
            Err(e) => {
                let err = DeviceHiveError::from(e);
                self.events.on_register_device(Some(clone_err(&err)), device).await;
                Err(err)
            }
        }
    }

    async fn get_device_data(&self, device: Arc<Device>) -> Result<(), DeviceHiveError> {
        let url = self.device_url(&device);
        let resp = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .send()
            .await?;
        let json: Value = resp.error_for_status()?.json().await?;
        let merged = merge_device_response(&device, json);
        self.events.on_get_device_data(None, Arc::new(merged)).await;
        Ok(())
    }

    async fn update_device_data(&self, device: Arc<Device>) -> Result<(), DeviceHiveError> {
        let url = self.device_url(&device);
        self.client
            .put(&url)
            .timeout(self.request_timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .json(device.as_ref())
            .send()
            .await?
            .error_for_status()?;
        self.events.on_update_device_data(None, Arc::clone(&device)).await;
        Ok(())
    }

    async fn subscribe_for_commands(
        &self,
        device: Arc<Device>,
        timestamp: Option<String>,
    ) -> Result<(), DeviceHiveError> {
        let mut polls = self.polls.lock().await;
        if polls.contains_key(&device.id) {
            return Ok(());
        }
        info!(device = %device.id, "starting command poll loop");
        let handle = self.spawn_poll_loop(Arc::clone(&device), timestamp);
        polls.insert(device.id.clone(), handle);
        Ok(())
    }

    async fn unsubscribe_from_commands(&self, device: Arc<Device>) -> Result<(), DeviceHiveError> {
        let mut polls = self.polls.lock().await;
        if let Some(handle) = polls.remove(&device.id) {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
            debug!(device = %device.id, "stopped command poll loop");
        }
        Ok(())
    }

    async fn update_command(
        &self,
        device: Arc<Device>,
        command: Command,
    ) -> Result<(), DeviceHiveError> {
        let url = format!("{}/device/{}/command/{}", self.base_url, device.id, command.id);
        let body = serde_json::json!({ "status": command.status, "result": command.result });
        self.client
            .put(url)
            .timeout(self.request_timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        self.events.on_update_command(None, device).await;
        Ok(())
    }

    async fn insert_notification(
        &self,
        device: Arc<Device>,
        notification: Notification,
    ) -> Result<(), DeviceHiveError> {
        let url = format!("{}/device/{}/notification", self.base_url, device.id);
        self.client
            .post(url)
            .timeout(self.request_timeout)
            .header("Auth-DeviceID", device.id.as_str())
            .header("Auth-DeviceKey", device.key.clone())
            .json(&notification)
            .send()
            .await?
            .error_for_status()?;
        self.events.on_insert_notification(None, device).await;
        Ok(())
    }

    async fn cancel_all(&self) {
        let mut polls = self.polls.lock().await;
        for (_, handle) in polls.drain() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
    }
}

/// Delay before re-polling after a failed request. A bad device key or a
/// refused connection fails in milliseconds, so retrying immediately would
/// busy-loop the task and flood the log.
const POLL_RETRY_BACKOFF: Duration = Duration::from_secs(5);

impl HttpDeviceService {
    // Open Question (c): first poll omits `timestamp` when the caller
    // passes None, asking the server for whatever is outstanding right now.
    fn spawn_poll_loop(&self, device: Arc<Device>, timestamp: Option<String>) -> PollHandle {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let timeout = self.request_timeout;
        let events = Arc::clone(&self.events);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut last_timestamp = timestamp;
            loop {
                if *shutdown_rx.borrow() {
                    return;
                }
                let poll = Self::poll_once(&client, &base_url, &device, timeout, &last_timestamp);
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => return,
                    result = poll => {
                        match result {
                            Ok(commands) => {
                                for cmd in commands {
                                    if let Some(ts) = max_timestamp(&last_timestamp, &cmd.timestamp) {
                                        last_timestamp = Some(ts);
                                    }
                                    events.on_insert_command(None, Arc::clone(&device), cmd).await;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "poll request failed, backing off before retry");
                                tokio::select! {
                                    biased;
                                    _ = shutdown_rx.changed() => return,
                                    () = tokio::time::sleep(POLL_RETRY_BACKOFF) => {}
                                }
                            }
                        }
                    }
                }
            }
        });

        PollHandle { shutdown: shutdown_tx, task }
    }
}

fn merge_device_response(original: &Device, json: Value) -> Device {
    let mut merged: Device = serde_json::from_value(json).unwrap_or_else(|_| original.clone());
    if merged.key.is_empty() {
        merged.key = original.key.clone();
    }
    merged
}

fn clone_err(err: &DeviceHiveError) -> DeviceHiveError {
    // DeviceHiveError doesn't derive Clone (its sources don't); synthesize
    // an equivalent for the "also hand the event sink an error" path.
    match err {
        DeviceHiveError::Cancelled => DeviceHiveError::Cancelled,
        DeviceHiveError::Timeout => DeviceHiveError::Timeout,
        DeviceHiveError::ProtocolFault(s) => DeviceHiveError::ProtocolFault(s.clone()),
        DeviceHiveError::BadChecksum => DeviceHiveError::BadChecksum,
        DeviceHiveError::Validation(s) => DeviceHiveError::Validation(s.clone()),
        DeviceHiveError::Transport(_) => DeviceHiveError::Validation(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_timestamp_prefers_later_candidate() {
        assert_eq!(max_timestamp(&None, "2020-01-01T00:00:00Z").as_deref(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(
            max_timestamp(&Some("2020-01-01T00:00:00Z".into()), "2019-01-01T00:00:00Z"),
            None
        );
        assert_eq!(
            max_timestamp(&Some("2020-01-01T00:00:00Z".into()), "2021-01-01T00:00:00Z").as_deref(),
            Some("2021-01-01T00:00:00Z")
        );
    }

    #[test]
    fn merge_device_response_preserves_original_key() {
        let original = Device::new("d1", "secret-key", "orig-name");
        let json = serde_json::json!({"id": "d1", "name": "X", "status": "online"});
        let merged = merge_device_response(&original, json);
        assert_eq!(merged.key, "secret-key");
        assert_eq!(merged.name, "X");
        assert_eq!(merged.status, "online");
    }
}
