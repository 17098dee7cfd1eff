//! Desired state for one cluster or one machine
//!
//! Scopes are built once per reconcile from the custom resources and are
//! never mutated by the reconcilers. Reconcilers clone a spec before
//! injecting references to resources created earlier in the chain.

use infra_api::compute::{
    AccessConfig, Address, AttachedDisk, AttachedDiskInitializeParams, BackendService, Firewall,
    FirewallAllowed, ForwardingRule, HealthCheck, Instance, InstanceGroup, Metadata, NamedPort,
    Network, NetworkInterface, NetworkRoutingConfig, Router, RouterNat, SecondaryRange,
    ServiceAccount, Subnetwork, Tags, TargetTcpProxy, TcpHealthCheck,
};
use infra_api::v1alpha4::{GCPCluster, GCPMachine, MachineRole, SubnetSpec};
use infra_api::{cluster_tag, ResourceKey};
use ipnetwork::IpNetwork;
use std::collections::BTreeMap;

use crate::{Error, Result};

pub const DEFAULT_NETWORK_NAME: &str = "default";
pub const DEFAULT_BACKEND_PORT: i32 = 6443;
pub const FRONTEND_PORT: u16 = 443;
pub const DEFAULT_ROOT_DEVICE_SIZE_GB: i64 = 30;

const APISERVER_PORT_NAME: &str = "apiserver";
const HEALTH_CHECK_SOURCE_RANGES: [&str; 2] = ["35.191.0.0/16", "130.211.0.0/22"];
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Base name shared by the load balancer resources of a cluster
pub fn apiserver_name(cluster_name: &str) -> String {
    format!("{}-apiserver", cluster_name)
}

/// Name of the control plane instance group in `zone`
pub fn instance_group_name(cluster_name: &str, zone: &str) -> String {
    format!("{}-{}", apiserver_name(cluster_name), zone)
}

fn role_tag(cluster_name: &str, role: MachineRole) -> String {
    format!("{}-{}", cluster_name, role.tag())
}

/// Specs of the load balancer chain in front of the control plane
#[derive(Clone, Debug, Default)]
pub struct LoadBalancerSpec {
    pub address: Address,
    pub health_check: HealthCheck,
    pub backend_service: BackendService,
    /// Template for the per-zone groups; the name is suffixed with the zone
    pub instance_group: InstanceGroup,
    pub target_tcp_proxy: TargetTcpProxy,
    pub forwarding_rule: ForwardingRule,
}

/// Desired state of the infrastructure shared by a cluster
#[derive(Clone, Debug, Default)]
pub struct ClusterScope {
    pub name: String,
    pub project: String,
    pub region: String,
    pub network: Network,
    pub router: Router,
    pub subnets: Vec<Subnetwork>,
    pub firewalls: Vec<Firewall>,
    pub load_balancer: LoadBalancerSpec,
    /// Zones requested by the cluster; empty means every zone of the region
    pub failure_domains: Vec<String>,
    /// Zones discovered by the last successful reconcile
    pub recorded_failure_domains: Vec<String>,
}

impl ClusterScope {
    pub fn from_cluster(cluster: &GCPCluster) -> Result<Self> {
        let name = cluster
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidSpec("GCPCluster has no name".to_string()))?;
        let spec = &cluster.spec;
        if spec.project.is_empty() {
            return Err(Error::InvalidSpec(format!("cluster {}: project is required", name)));
        }
        if spec.region.is_empty() {
            return Err(Error::InvalidSpec(format!("cluster {}: region is required", name)));
        }

        let tag = cluster_tag(&name);
        let network_name = spec
            .network
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string());
        let backend_port = spec
            .network
            .load_balancer_backend_port
            .unwrap_or(DEFAULT_BACKEND_PORT);

        let network = Network {
            name: network_name.clone(),
            description: tag,
            auto_create_subnetworks: Some(spec.network.auto_create_subnetworks.unwrap_or(true)),
            routing_config: Some(NetworkRoutingConfig {
                routing_mode: "REGIONAL".to_string(),
            }),
            ..Default::default()
        };

        let router = Router {
            name: format!("{}-router", network_name),
            region: spec.region.clone(),
            nats: vec![RouterNat {
                name: format!("{}-nat", network_name),
                nat_ip_allocate_option: "AUTO_ONLY".to_string(),
                source_subnetwork_ip_ranges_to_nat: "ALL_SUBNETWORKS_ALL_IP_RANGES".to_string(),
            }],
            ..Default::default()
        };

        let subnets = spec
            .network
            .subnets
            .iter()
            .map(|s| subnet_spec(&name, &spec.region, s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            firewalls: firewall_specs(&name, backend_port),
            load_balancer: load_balancer_spec(&name, backend_port),
            name,
            project: spec.project.clone(),
            region: spec.region.clone(),
            network,
            router,
            subnets,
            failure_domains: spec.failure_domains.clone(),
            recorded_failure_domains: cluster
                .status
                .as_ref()
                .map(|s| s.failure_domains.clone())
                .unwrap_or_default(),
        })
    }

    /// Ownership tag written into every resource created for this cluster
    pub fn tag(&self) -> String {
        cluster_tag(&self.name)
    }

    pub fn network_key(&self) -> ResourceKey {
        ResourceKey::global(&self.network.name)
    }

    pub fn router_key(&self) -> ResourceKey {
        ResourceKey::regional(&self.router.name, &self.region)
    }

    pub fn subnet_key(&self, subnet: &Subnetwork) -> ResourceKey {
        ResourceKey::regional(&subnet.name, &self.region)
    }

    pub fn instance_group_key(&self, zone: &str) -> ResourceKey {
        ResourceKey::zonal(instance_group_name(&self.name, zone), zone)
    }
}

fn validate_cidr(cluster: &str, what: &str, cidr: &str) -> Result<()> {
    cidr.parse::<IpNetwork>().map(|_| ()).map_err(|e| {
        Error::InvalidSpec(format!(
            "cluster {}: {} has invalid CIDR {:?}: {}",
            cluster, what, cidr, e
        ))
    })
}

fn subnet_spec(cluster: &str, region: &str, spec: &SubnetSpec) -> Result<Subnetwork> {
    if spec.name.is_empty() {
        return Err(Error::InvalidSpec(format!(
            "cluster {}: subnet name is required",
            cluster
        )));
    }
    validate_cidr(cluster, &format!("subnet {}", spec.name), &spec.cidr_block)?;

    // BTreeMap iteration keeps the ranges sorted by name
    let mut secondary_ip_ranges = Vec::with_capacity(spec.secondary_cidr_blocks.len());
    for (range_name, cidr) in &spec.secondary_cidr_blocks {
        validate_cidr(
            cluster,
            &format!("secondary range {} of subnet {}", range_name, spec.name),
            cidr,
        )?;
        secondary_ip_ranges.push(SecondaryRange::new(range_name, cidr));
    }

    Ok(Subnetwork {
        name: spec.name.clone(),
        description: spec.description.clone().unwrap_or_default(),
        region: region.to_string(),
        ip_cidr_range: spec.cidr_block.clone(),
        private_ip_google_access: spec.private_google_access,
        secondary_ip_ranges,
        ..Default::default()
    })
}

fn firewall_specs(cluster: &str, backend_port: i32) -> Vec<Firewall> {
    let control_plane = role_tag(cluster, MachineRole::ControlPlane);
    let node = role_tag(cluster, MachineRole::Node);
    let backend_port = backend_port.to_string();

    vec![
        Firewall {
            name: format!("allow-{}-healthchecks", cluster),
            direction: "INGRESS".to_string(),
            priority: Some(255),
            allowed: vec![FirewallAllowed::ports("tcp", &[backend_port.as_str()])],
            source_ranges: HEALTH_CHECK_SOURCE_RANGES
                .iter()
                .map(|r| r.to_string())
                .collect(),
            target_tags: vec![control_plane.clone()],
            ..Default::default()
        },
        Firewall {
            name: format!("allow-{}-cluster", cluster),
            direction: "INGRESS".to_string(),
            priority: Some(255),
            allowed: vec![
                FirewallAllowed::protocol("tcp"),
                FirewallAllowed::protocol("udp"),
                FirewallAllowed::protocol("icmp"),
            ],
            source_tags: vec![control_plane.clone(), node.clone()],
            target_tags: vec![control_plane, node],
            ..Default::default()
        },
    ]
}

fn load_balancer_spec(cluster: &str, backend_port: i32) -> LoadBalancerSpec {
    let name = apiserver_name(cluster);
    LoadBalancerSpec {
        address: Address {
            name: name.clone(),
            address_type: "EXTERNAL".to_string(),
            ip_version: "IPV4".to_string(),
            ..Default::default()
        },
        health_check: HealthCheck {
            name: name.clone(),
            check_type: "TCP".to_string(),
            tcp_health_check: Some(TcpHealthCheck { port: backend_port }),
            check_interval_sec: Some(10),
            timeout_sec: Some(5),
            healthy_threshold: Some(5),
            unhealthy_threshold: Some(3),
            ..Default::default()
        },
        backend_service: BackendService {
            name: name.clone(),
            load_balancing_scheme: "EXTERNAL".to_string(),
            protocol: "TCP".to_string(),
            port_name: APISERVER_PORT_NAME.to_string(),
            timeout_sec: Some(600),
            ..Default::default()
        },
        instance_group: InstanceGroup {
            name: name.clone(),
            named_ports: vec![NamedPort {
                name: APISERVER_PORT_NAME.to_string(),
                port: backend_port,
            }],
            ..Default::default()
        },
        target_tcp_proxy: TargetTcpProxy {
            name: name.clone(),
            proxy_header: "NONE".to_string(),
            ..Default::default()
        },
        forwarding_rule: ForwardingRule {
            name,
            ip_protocol: "TCP".to_string(),
            load_balancing_scheme: "EXTERNAL".to_string(),
            port_range: format!("{}-{}", FRONTEND_PORT, FRONTEND_PORT),
            ..Default::default()
        },
    }
}

/// Zone segment of a `gce://<project>/<zone>/<name>` provider ID
pub fn zone_from_provider_id(provider_id: &str) -> Option<String> {
    let mut parts = provider_id.strip_prefix("gce://")?.split('/');
    let (_project, zone, name) = (parts.next()?, parts.next()?, parts.next()?);
    if zone.is_empty() || name.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(zone.to_string())
}

/// Desired state of a single machine
#[derive(Clone, Debug, Default)]
pub struct MachineScope {
    pub name: String,
    pub cluster_name: String,
    pub project: String,
    pub zone: String,
    pub role: MachineRole,
    /// Instance spec without bootstrap data
    pub instance: Instance,
}

impl MachineScope {
    /// Builds the machine scope. The zone is `spec.zone`, else the zone of
    /// an instance already created (from `status.providerID`), else the
    /// first failure domain recorded on the cluster.
    pub fn from_machine(machine: &GCPMachine, cluster: &GCPCluster) -> Result<Self> {
        let name = machine
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidSpec("GCPMachine has no name".to_string()))?;
        let spec = &machine.spec;
        let cluster_spec = &cluster.spec;

        if spec.instance_type.is_empty() {
            return Err(Error::InvalidSpec(format!(
                "machine {}: instanceType is required",
                name
            )));
        }

        let created_zone = machine
            .status
            .as_ref()
            .and_then(|s| s.provider_id.as_deref())
            .and_then(zone_from_provider_id);

        let zone = match (&spec.zone, created_zone) {
            (Some(zone), _) if !zone.is_empty() => zone.clone(),
            (_, Some(zone)) => zone,
            _ => cluster
                .status
                .as_ref()
                .and_then(|s| s.failure_domains.first().cloned())
                .ok_or_else(|| {
                    Error::InvalidSpec(format!(
                        "machine {}: no zone set and cluster {} has no failure domains yet",
                        name, spec.cluster_name
                    ))
                })?,
        };

        let source_image = match (&spec.image, &spec.image_family) {
            (Some(image), _) if !image.is_empty() => image.clone(),
            (_, Some(family)) if !family.is_empty() => format!(
                "projects/{}/global/images/family/{}",
                cluster_spec.project, family
            ),
            _ => {
                return Err(Error::InvalidSpec(format!(
                    "machine {}: image or imageFamily is required",
                    name
                )))
            }
        };

        let network_name = cluster_spec
            .network
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string());
        let mut interface = NetworkInterface {
            network: format!(
                "projects/{}/global/networks/{}",
                cluster_spec.project, network_name
            ),
            ..Default::default()
        };
        if let Some(subnet) = &spec.subnet {
            interface.subnetwork = format!(
                "projects/{}/regions/{}/subnetworks/{}",
                cluster_spec.project, cluster_spec.region, subnet
            );
        }
        if spec.public_ip.unwrap_or(false) {
            interface.access_configs.push(AccessConfig {
                name: "External NAT".to_string(),
                access_type: "ONE_TO_ONE_NAT".to_string(),
                ..Default::default()
            });
        }

        let mut tags = vec![
            role_tag(&spec.cluster_name, spec.role),
            spec.cluster_name.clone(),
        ];
        for tag in &spec.additional_network_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        let mut labels: BTreeMap<String, String> = cluster_spec.additional_labels.clone();
        labels.extend(spec.additional_labels.clone());
        labels.insert(cluster_tag(&spec.cluster_name), "owned".to_string());
        labels.insert("role".to_string(), spec.role.tag().to_string());

        let mut metadata = Metadata::default();
        for (key, value) in &spec.additional_metadata {
            metadata.set(key, value);
        }

        let instance = Instance {
            name: name.clone(),
            description: cluster_tag(&spec.cluster_name),
            machine_type: format!("zones/{}/machineTypes/{}", zone, spec.instance_type),
            network_interfaces: vec![interface],
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: true,
                initialize_params: Some(AttachedDiskInitializeParams {
                    disk_size_gb: spec
                        .root_device_size
                        .unwrap_or(DEFAULT_ROOT_DEVICE_SIZE_GB)
                        .to_string(),
                    disk_type: format!("zones/{}/diskTypes/pd-standard", zone),
                    source_image,
                }),
            }],
            metadata,
            tags: Tags { items: tags },
            labels,
            service_accounts: vec![ServiceAccount {
                email: spec
                    .service_account
                    .clone()
                    .unwrap_or_else(|| "default".to_string()),
                scopes: vec![CLOUD_PLATFORM_SCOPE.to_string()],
            }],
            ..Default::default()
        };

        Ok(Self {
            name,
            cluster_name: spec.cluster_name.clone(),
            project: cluster_spec.project.clone(),
            zone,
            role: spec.role,
            instance,
        })
    }

    pub fn is_control_plane(&self) -> bool {
        self.role == MachineRole::ControlPlane
    }

    pub fn instance_key(&self) -> ResourceKey {
        ResourceKey::zonal(&self.name, &self.zone)
    }

    pub fn control_plane_group_key(&self) -> ResourceKey {
        ResourceKey::zonal(instance_group_name(&self.cluster_name, &self.zone), &self.zone)
    }

    pub fn provider_id(&self) -> String {
        format!("gce://{}/{}/{}", self.project, self.zone, self.name)
    }
}
