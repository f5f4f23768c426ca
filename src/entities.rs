//! The DeviceHive entity model and its JSON projection.
//!
//! Field names here intentionally diverge from their JSON keys in a few
//! places (`Command::name` is `command` on the wire, `Notification::name`
//! is `notification`) — `serde(rename)` keeps the Rust-side names
//! idiomatic while matching the server API exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Network {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(rename = "description", default)]
    pub desc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClass {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub is_permanent: bool,
    #[serde(default)]
    pub offline_timeout: i32,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Equipment {
    #[serde(default)]
    pub id: u64,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A device GUID with ASCII case-insensitive equality and hashing, matching
/// the server's comparison semantics for device identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceGuid(pub String);

impl DeviceGuid {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceGuid(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for DeviceGuid {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}
impl Eq for DeviceGuid {}

impl std::hash::Hash for DeviceGuid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            b.to_ascii_lowercase().hash(state);
        }
    }
}

impl std::fmt::Display for DeviceGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DeviceGuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceGuid {
    fn from(s: &str) -> Self {
        DeviceGuid(s.to_owned())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: DeviceGuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub network: Option<Network>,
    #[serde(rename = "deviceClass", default)]
    pub device_class: Option<DeviceClass>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
}

impl Device {
    pub fn new(id: impl Into<String>, key: impl Into<String>, name: impl Into<String>) -> Self {
        Device {
            id: DeviceGuid::new(id),
            name: name.into(),
            key: key.into(),
            status: String::new(),
            data: None,
            network: None,
            device_class: None,
            equipment: Vec::new(),
        }
    }

    /// Look up equipment by its (case-sensitive) code.
    pub fn find_equipment(&self, code: &str) -> Option<&Equipment> {
        self.equipment.iter().find(|e| e.code == code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Command {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "command")]
    pub name: String,
    #[serde(rename = "parameters", default)]
    pub params: Value,
    #[serde(default)]
    pub lifetime: i32,
    #[serde(default)]
    pub flags: i32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "notification")]
    pub name: String,
    #[serde(rename = "parameters", default)]
    pub params: Value,
}

impl Notification {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Notification { id: 0, timestamp: String::new(), name: name.into(), params }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerInfo {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(rename = "serverTimestamp", default)]
    pub timestamp: String,
    #[serde(rename = "restServerUrl", default)]
    pub alternative_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_guid_is_case_insensitive() {
        assert_eq!(DeviceGuid::new("D1"), DeviceGuid::new("d1"));
        let mut set = std::collections::HashSet::new();
        set.insert(DeviceGuid::new("Abc-123"));
        assert!(set.contains(&DeviceGuid::new("abc-123")));
    }

    #[test]
    fn command_json_round_trip_uses_wire_field_names() {
        let json = serde_json::json!({
            "id": 42, "timestamp": "2020-01-01T00:00:00Z", "command": "reboot",
            "parameters": {}, "lifetime": 0, "flags": 0, "status": "", "result": null
        });
        let cmd: Command = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(cmd.id, 42);
        assert_eq!(cmd.name, "reboot");
        let round_tripped = serde_json::to_value(&cmd).unwrap();
        assert_eq!(round_tripped["command"], "reboot");
        assert_eq!(round_tripped["parameters"], serde_json::json!({}));
    }

    #[test]
    fn notification_json_uses_notification_key() {
        let n = Notification::new("ping", serde_json::json!({"x": 1}));
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["notification"], "ping");
        assert_eq!(v["parameters"]["x"], 1);
    }

    #[test]
    fn device_equipment_lookup_is_exact_match() {
        let mut d = Device::new("d1", "k1", "name");
        d.equipment.push(Equipment {
            id: 1,
            code: "LED".into(),
            name: "led".into(),
            kind: "switch".into(),
            data: None,
        });
        assert!(d.find_equipment("LED").is_some());
        assert!(d.find_equipment("led").is_none());
    }

    #[test]
    fn device_register_response_absorbs_network_and_class() {
        let json = serde_json::json!({
            "id": "d1", "name": "X", "status": "online",
            "network": {"id": 7, "name": "n", "description": ""},
            "deviceClass": {"id": 3, "name": "c", "version": "1", "isPermanent": false, "offlineTimeout": 0}
        });
        let device: Device = serde_json::from_value(json).unwrap();
        assert_eq!(device.name, "X");
        assert_eq!(device.status, "online");
        assert_eq!(device.network.unwrap().id, 7);
        assert_eq!(device.device_class.unwrap().id, 3);
    }
}
