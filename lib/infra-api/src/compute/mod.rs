//! Compute Engine resource representations
//!
//! Field names follow the Compute Engine v1 JSON encoding. Only the fields the
//! controller reads or writes are modelled; everything else the provider
//! returns is dropped on deserialization.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::key::{ResourceKey, Scope};

pub mod firewall;
pub mod instance;
pub mod loadbalancer;
pub mod location;
pub mod network;

pub use firewall::{Firewall, FirewallAllowed};
pub use instance::{
    AccessConfig, AttachedDisk, AttachedDiskInitializeParams, Instance, InstanceState,
    InstanceStatus, InstanceWithNamedPorts, Metadata, MetadataItem, NetworkInterface,
    ServiceAccount, Tags,
};
pub use loadbalancer::{
    Address, Backend, BackendService, ForwardingRule, HealthCheck, InstanceGroup, NamedPort,
    TargetTcpProxy, TcpHealthCheck,
};
pub use location::{Region, Zone};
pub use network::{Network, NetworkRoutingConfig, Router, RouterNat, SecondaryRange, Subnetwork};

/// Common surface of every provider resource
pub trait ComputeResource:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    /// Human readable kind used in logs and errors
    const KIND: &'static str;
    /// Collection name in the REST path, e.g. `forwardingRules`
    const COLLECTION: &'static str;
    /// Project-level collections (regions, zones) have no `global/` segment
    const PROJECT_LEVEL: bool = false;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn self_link(&self) -> &str;
    fn set_self_link(&mut self, self_link: String);
}

/// Project-relative path of a collection, e.g. `regions/us-east1/routers`
pub fn collection_path<T: ComputeResource>(scope: &Scope) -> String {
    match scope {
        Scope::Global if T::PROJECT_LEVEL => T::COLLECTION.to_string(),
        scope => format!("{}/{}", scope.path(), T::COLLECTION),
    }
}

/// Project-relative path of a resource, e.g. `zones/us-east1-b/instances/vm-0`
pub fn resource_path<T: ComputeResource>(key: &ResourceKey) -> String {
    format!("{}/{}", collection_path::<T>(key.scope()), key.name())
}

macro_rules! compute_resource {
    ($ty:ty, $kind:literal, $collection:literal) => {
        compute_resource!($ty, $kind, $collection, false);
    };
    ($ty:ty, $kind:literal, $collection:literal, $project_level:literal) => {
        impl $crate::compute::ComputeResource for $ty {
            const KIND: &'static str = $kind;
            const COLLECTION: &'static str = $collection;
            const PROJECT_LEVEL: bool = $project_level;

            fn name(&self) -> &str {
                &self.name
            }

            fn description(&self) -> &str {
                &self.description
            }

            fn self_link(&self) -> &str {
                &self.self_link
            }

            fn set_self_link(&mut self, self_link: String) {
                self.self_link = self_link;
            }
        }
    };
}

pub(crate) use compute_resource;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert_eq!(
            resource_path::<Network>(&ResourceKey::global("net1")),
            "global/networks/net1"
        );
        assert_eq!(
            resource_path::<Router>(&ResourceKey::regional("r", "us-east1")),
            "regions/us-east1/routers/r"
        );
        assert_eq!(
            resource_path::<Instance>(&ResourceKey::zonal("vm-0", "us-east1-b")),
            "zones/us-east1-b/instances/vm-0"
        );
        assert_eq!(
            resource_path::<Region>(&ResourceKey::global("us-east1")),
            "regions/us-east1"
        );
        assert_eq!(collection_path::<Zone>(&Scope::Global), "zones");
        assert_eq!(
            collection_path::<ForwardingRule>(&Scope::Global),
            "global/forwardingRules"
        );
    }
}
