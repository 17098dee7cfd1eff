//! API types for the GCP cluster infrastructure controller
//!
//! This library defines:
//! - Compute Engine resource representations (networks, routers, subnetworks,
//!   firewalls, load-balancer pieces, instances)
//! - ResourceKey: the global/regional/zonal address of a provider resource
//! - The ownership tag written into the description of resources we create
//! - GCPCluster and GCPMachine custom resources

pub mod compute;
pub mod key;
pub mod ownership;
pub mod v1alpha4;

pub use compute::ComputeResource;
pub use key::{ResourceKey, Scope};
pub use ownership::{cluster_tag, is_owned_by};
pub use v1alpha4::{GCPCluster, GCPMachine};
