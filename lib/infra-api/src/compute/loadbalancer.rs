use serde::{Deserialize, Serialize};

use super::compute_resource;

/// Reserved external IP address
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The reserved IP, populated by the provider
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub check_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_health_check: Option<TcpHealthCheck>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_sec: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<i32>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpHealthCheck {
    pub port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendService {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_balancing_scheme: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<i32>,

    /// Health check self-links
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<Backend>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    /// Instance group self-link
    pub group: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub balancing_mode: String,
}

/// Unmanaged zonal instance group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_ports: Vec<NamedPort>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedPort {
    pub name: String,
    pub port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetTcpProxy {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Backend service self-link
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_header: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRule {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(rename = "IPAddress", default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,

    #[serde(rename = "IPProtocol", default, skip_serializing_if = "String::is_empty")]
    pub ip_protocol: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_balancing_scheme: String,

    /// e.g. `443-443`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port_range: String,

    /// Target proxy self-link
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

impl ForwardingRule {
    /// First port of the port range, if it parses
    pub fn port(&self) -> Option<u16> {
        self.port_range.split('-').next()?.trim().parse().ok()
    }
}

compute_resource!(Address, "address", "addresses");
compute_resource!(HealthCheck, "health check", "healthChecks");
compute_resource!(BackendService, "backend service", "backendServices");
compute_resource!(InstanceGroup, "instance group", "instanceGroups");
compute_resource!(TargetTcpProxy, "target TCP proxy", "targetTcpProxies");
compute_resource!(ForwardingRule, "forwarding rule", "forwardingRules");
