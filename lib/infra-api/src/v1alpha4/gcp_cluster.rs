use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GCPCluster declares the network, firewall and API server load balancer
/// for one workload cluster
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "GCPCluster",
    plural = "gcpclusters",
    namespaced,
    derive = "Default",
    status = "GCPClusterStatus",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Network","type":"string","jsonPath":".status.network.selfLink","priority":1}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.controlPlaneEndpoint.host"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct GCPClusterSpec {
    /// GCP project the cluster lives in
    pub project: String,

    /// Region for regional resources (router, subnetworks)
    pub region: String,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkSpec,

    /// Zones to spread control-plane machines over. Empty means every zone
    /// of the region.
    #[serde(default)]
    pub failure_domains: Vec<String>,

    /// Labels added to every instance of the cluster
    #[serde(default)]
    pub additional_labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Network name. Defaults to "default".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the provider creates one subnetwork per region. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_create_subnetworks: Option<bool>,

    /// Subnetworks to create or extend
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,

    /// Port the API server listens on behind the load balancer. Defaults to 6443.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_backend_port: Option<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub name: String,

    /// Primary range, e.g. 10.0.0.0/20
    pub cidr_block: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Secondary ranges keyed by range name
    #[serde(default)]
    pub secondary_cidr_blocks: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_google_access: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GCPClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub network: NetworkStatus,

    /// Zones the control plane may be placed in
    #[serde(default)]
    pub failure_domains: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    /// Self-link of the NAT router, set only when the network is ours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}
