//! Reconciliation engine for GCP cluster infrastructure
//!
//! This library provides:
//! - Capability traits over provider resources (get/insert/update/patch/delete/list)
//! - The ensure primitive (get, insert if missing, re-fetch)
//! - Network, firewall, load balancer and instance reconcilers
//! - Cluster and machine entry points with fixed create/delete ordering
//! - Desired-state scopes built from the GCPCluster and GCPMachine resources

pub mod cloud;
pub mod context;
pub mod engine;
pub mod ensure;
pub mod error;
pub mod scope;
pub mod services;

#[cfg(test)]
pub(crate) mod fake;

pub use cloud::{ComputeCloud, Filter, InstanceGroupClient, ResourceClient};
pub use context::CallContext;
pub use engine::{ClusterReconciler, MachineReconciler};
pub use error::{Error, Result};
pub use scope::{ClusterScope, MachineScope};
pub use services::instances::BootstrapDataSource;
pub use services::{ClusterOutput, LoadBalancerOutput, MachineOutput, NetworkOutput};
