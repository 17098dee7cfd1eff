//! Per-area reconcilers
//!
//! Each service borrows the cloud and the desired state for one call and
//! returns what it observed instead of writing into a shared scope.

use infra_api::compute::InstanceStatus;
use infra_api::v1alpha4::{ApiEndpoint, MachineAddress};

pub mod failure_domains;
pub mod firewalls;
pub mod instances;
pub mod loadbalancers;
pub mod networks;

pub use failure_domains::FailureDomainService;
pub use firewalls::FirewallService;
pub use instances::InstanceService;
pub use loadbalancers::LoadBalancerService;
pub use networks::NetworkService;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkOutput {
    pub self_link: Option<String>,
    /// Only set when the network belongs to this cluster
    pub router: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadBalancerOutput {
    pub control_plane_endpoint: Option<ApiEndpoint>,
    /// Self-links of the per-zone control plane instance groups
    pub instance_groups: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterOutput {
    pub failure_domains: Vec<String>,
    pub network: NetworkOutput,
    pub load_balancer: LoadBalancerOutput,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MachineOutput {
    pub provider_id: String,
    pub addresses: Vec<MachineAddress>,
    pub instance_status: Option<InstanceStatus>,
    pub instance_self_link: String,
}

impl MachineOutput {
    pub fn is_running(&self) -> bool {
        self.instance_status == Some(InstanceStatus::Running)
    }
}
