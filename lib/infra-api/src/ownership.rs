//! Ownership marker for resources created by the controller
//!
//! A resource is ours iff its description equals [`cluster_tag`] for the
//! cluster. There is no other ledger, so a foreign resource whose description
//! happens to match is treated as ours.

use crate::compute::ComputeResource;

/// Prefix of the description written into every resource we create
pub const CLUSTER_TAG_PREFIX: &str = "capg-cluster-";

/// Ownership tag for the given cluster name
pub fn cluster_tag(cluster_name: &str) -> String {
    format!("{}{}", CLUSTER_TAG_PREFIX, cluster_name)
}

/// Returns true if the resource was created for this cluster
pub fn is_owned_by<T: ComputeResource>(resource: &T, cluster_name: &str) -> bool {
    resource.description() == cluster_tag(cluster_name)
}
