//! Networks, NAT routers and subnetworks

use serde::{Deserialize, Serialize};

use super::compute_resource;

/// VPC network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_create_subnetworks: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_config: Option<NetworkRoutingConfig>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRoutingConfig {
    /// REGIONAL or GLOBAL
    pub routing_mode: String,
}

/// Cloud router carrying the NAT configuration for a network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Self-link of the network the router is attached to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nats: Vec<RouterNat>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterNat {
    pub name: String,
    pub nat_ip_allocate_option: String,
    pub source_subnetwork_ip_ranges_to_nat: String,
}

/// Regional subnetwork of a VPC network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnetwork {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_cidr_range: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_google_access: Option<bool>,

    /// Always serialized: an empty list is a meaningful patch
    #[serde(default)]
    pub secondary_ip_ranges: Vec<SecondaryRange>,

    /// Required by the provider on patch
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

/// Named secondary CIDR block of a subnetwork, used for IP aliasing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryRange {
    pub range_name: String,
    pub ip_cidr_range: String,
}

impl SecondaryRange {
    pub fn new(range_name: impl Into<String>, ip_cidr_range: impl Into<String>) -> Self {
        Self {
            range_name: range_name.into(),
            ip_cidr_range: ip_cidr_range.into(),
        }
    }
}

compute_resource!(Network, "network", "networks");
compute_resource!(Router, "router", "routers");
compute_resource!(Subnetwork, "subnetwork", "subnetworks");
