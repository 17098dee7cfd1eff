use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GCPMachine declares one compute instance of a workload cluster
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "GCPMachine",
    plural = "gcpmachines",
    namespaced,
    derive = "Default",
    status = "GCPMachineStatus",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.instanceStatus"}"#,
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".status.providerID","priority":1}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct GCPMachineSpec {
    /// Name of the GCPCluster in the same namespace
    pub cluster_name: String,

    #[serde(default)]
    pub role: MachineRole,

    /// Machine type, e.g. n1-standard-2
    pub instance_type: String,

    /// Zone to run in. Defaults to the cluster's first failure domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Full image URL. Takes precedence over image_family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_family: Option<String>,

    /// Boot disk size in GB. Defaults to 30.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_device_size: Option<i64>,

    /// Subnetwork name. Defaults to the network's auto subnet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,

    /// Attach an ephemeral external IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<bool>,

    #[serde(default)]
    pub additional_network_tags: Vec<String>,

    #[serde(default)]
    pub additional_metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub additional_labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default)]
    pub bootstrap: BootstrapRef,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MachineRole {
    ControlPlane,
    #[default]
    Node,
}

impl MachineRole {
    /// Suffix used in network tags and labels
    pub fn tag(&self) -> &'static str {
        match self {
            MachineRole::ControlPlane => "control-plane",
            MachineRole::Node => "node",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRef {
    /// Secret holding the bootstrap payload under the "value" key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GCPMachineStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub addresses: Vec<MachineAddress>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MachineAddress {
    #[serde(rename = "type")]
    pub address_type: MachineAddressType,
    pub address: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MachineAddressType {
    InternalIP,
    ExternalIP,
}

impl MachineAddress {
    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            address_type: MachineAddressType::InternalIP,
            address: address.into(),
        }
    }

    pub fn external(address: impl Into<String>) -> Self {
        Self {
            address_type: MachineAddressType::ExternalIP,
            address: address.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults_to_node() {
        let spec: GCPMachineSpec = serde_json::from_str(
            r#"{"clusterName":"c1","instanceType":"n1-standard-2"}"#,
        )
        .unwrap();
        assert_eq!(spec.role, MachineRole::Node);
        assert!(spec.bootstrap.data_secret_name.is_none());
    }

    #[test]
    fn test_address_wire_format() {
        let json = serde_json::to_value(MachineAddress::external("34.1.2.3")).unwrap();
        assert_eq!(json["type"], "ExternalIP");
        assert_eq!(json["address"], "34.1.2.3");
    }
}
