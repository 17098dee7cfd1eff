//! Firewall rules

use serde::{Deserialize, Serialize};

use super::compute_resource;

/// VPC firewall rule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    /// INGRESS or EGRESS
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub direction: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<FirewallAllowed>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ranges: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallAllowed {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

impl FirewallAllowed {
    pub fn protocol(ip_protocol: impl Into<String>) -> Self {
        Self {
            ip_protocol: ip_protocol.into(),
            ports: Vec::new(),
        }
    }

    pub fn ports(ip_protocol: impl Into<String>, ports: &[&str]) -> Self {
        Self {
            ip_protocol: ip_protocol.into(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Firewall {
    /// Compares the fields the controller manages, ignoring provider-populated ones
    pub fn same_rules(&self, other: &Firewall) -> bool {
        self.network == other.network
            && self.direction == other.direction
            && self.priority == other.priority
            && self.allowed == other.allowed
            && self.source_ranges == other.source_ranges
            && self.source_tags == other.source_tags
            && self.target_tags == other.target_tags
    }
}

compute_resource!(Firewall, "firewall", "firewalls");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_protocol_field_name() {
        let allowed = FirewallAllowed::ports("tcp", &["6443"]);
        let json = serde_json::to_value(&allowed).unwrap();
        assert_eq!(json["IPProtocol"], "tcp");
        assert_eq!(json["ports"][0], "6443");
    }

    #[test]
    fn test_same_rules_ignores_provider_fields() {
        let desired = Firewall {
            name: "allow-hc".to_string(),
            network: "net".to_string(),
            allowed: vec![FirewallAllowed::protocol("icmp")],
            ..Default::default()
        };
        let mut observed = desired.clone();
        observed.self_link = "https://example/allow-hc".to_string();
        observed.description = "something else".to_string();
        assert!(desired.same_rules(&observed));

        observed.target_tags.push("extra".to_string());
        assert!(!desired.same_rules(&observed));
    }
}
