use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::compute_resource;

/// Virtual machine instance
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,

    /// Partial URL, e.g. `zones/us-central1-a/machineTypes/n1-standard-2`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine_type: String,

    /// Populated by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InstanceStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<AttachedDisk>,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

/// Lifecycle status reported by the provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Stopped,
    Suspending,
    Suspended,
    Repairing,
    Terminated,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Provisioning => "PROVISIONING",
            InstanceStatus::Staging => "STAGING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Stopped => "STOPPED",
            InstanceStatus::Suspending => "SUSPENDING",
            InstanceStatus::Suspended => "SUSPENDED",
            InstanceStatus::Repairing => "REPAIRING",
            InstanceStatus::Terminated => "TERMINATED",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnetwork: String,

    /// Internal IP, populated by the provider
    #[serde(rename = "networkIP", default, skip_serializing_if = "String::is_empty")]
    pub network_ip: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// ONE_TO_ONE_NAT
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub access_type: String,

    /// External IP, populated by the provider
    #[serde(rename = "natIP", default, skip_serializing_if = "String::is_empty")]
    pub nat_ip: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(default)]
    pub boot: bool,

    #[serde(default)]
    pub auto_delete: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<AttachedDiskInitializeParams>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskInitializeParams {
    /// int64 encoded as a decimal string
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_size_gb: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<MetadataItem>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
}

impl Metadata {
    /// Sets a key, replacing any existing item with the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => item.value = value,
            None => self.items.push(MetadataItem { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

/// Network tags
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub email: String,

    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Filter for listing instance-group members
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    All,
    Running,
}

/// Member entry returned when listing an instance group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceWithNamedPorts {
    /// Instance self-link
    pub instance: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InstanceStatus>,
}

compute_resource!(Instance, "instance", "instances");
