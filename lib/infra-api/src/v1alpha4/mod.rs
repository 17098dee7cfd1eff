/// API version v1alpha4 of the infrastructure CRDs

pub mod gcp_cluster;
pub mod gcp_machine;

pub use gcp_cluster::{
    ApiEndpoint, GCPCluster, GCPClusterSpec, GCPClusterStatus, NetworkSpec, NetworkStatus,
    SubnetSpec,
};
pub use gcp_machine::{
    BootstrapRef, GCPMachine, GCPMachineSpec, GCPMachineStatus, MachineAddress,
    MachineAddressType, MachineRole,
};

/// API group for infrastructure resources
pub const API_GROUP: &str = "infrastructure.cluster.x-k8s.io";
/// API version for infrastructure resources
pub const API_VERSION: &str = "v1alpha4";
