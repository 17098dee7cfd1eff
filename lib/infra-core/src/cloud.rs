//! Capability sets over provider resources
//!
//! The engine only talks to these traits. The REST adapter implements them
//! for Compute Engine; tests substitute an in-memory fake.

use async_trait::async_trait;
use infra_api::compute::{
    Address, BackendService, ComputeResource, Firewall, ForwardingRule, HealthCheck, Instance,
    InstanceGroup, InstanceState, InstanceWithNamedPorts, Network, Region, Router, Subnetwork,
    TargetTcpProxy, Zone,
};
use infra_api::{ResourceKey, Scope};

use crate::context::CallContext;
use crate::{Error, Result};

/// Server-side filter for list calls
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    None,
    /// `field eq value`; the provider treats `value` as an RE2 pattern
    Eq { field: String, value: String },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Filter expression in the provider's list syntax
    pub fn expression(&self) -> Option<String> {
        match self {
            Filter::None => None,
            Filter::Eq { field, value } => Some(format!("{} eq {}", field, value)),
        }
    }
}

/// Get/Insert/Update/Patch/Delete/List over one resource kind.
///
/// Mutations return once the provider reports the change as done. Kinds that
/// do not support a verb keep the default, which returns `Unsupported`.
#[async_trait]
pub trait ResourceClient<T: ComputeResource>: Send + Sync {
    async fn get(&self, ctx: &CallContext, key: &ResourceKey) -> Result<T>;

    async fn insert(&self, ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()>;

    async fn update(&self, _ctx: &CallContext, _key: &ResourceKey, _obj: &T) -> Result<()> {
        Err(Error::Unsupported {
            kind: T::KIND,
            verb: "update",
        })
    }

    async fn patch(&self, _ctx: &CallContext, _key: &ResourceKey, _obj: &T) -> Result<()> {
        Err(Error::Unsupported {
            kind: T::KIND,
            verb: "patch",
        })
    }

    async fn delete(&self, ctx: &CallContext, key: &ResourceKey) -> Result<()>;

    async fn list(&self, _ctx: &CallContext, _scope: &Scope, _filter: &Filter) -> Result<Vec<T>> {
        Err(Error::Unsupported {
            kind: T::KIND,
            verb: "list",
        })
    }
}

/// Instance groups additionally manage their membership list
#[async_trait]
pub trait InstanceGroupClient: ResourceClient<InstanceGroup> {
    async fn list_instances(
        &self,
        ctx: &CallContext,
        key: &ResourceKey,
        state: InstanceState,
    ) -> Result<Vec<InstanceWithNamedPorts>>;

    /// Adds instances by self-link
    async fn add_instances(
        &self,
        ctx: &CallContext,
        key: &ResourceKey,
        instances: &[String],
    ) -> Result<()>;

    /// Removes instances by self-link
    async fn remove_instances(
        &self,
        ctx: &CallContext,
        key: &ResourceKey,
        instances: &[String],
    ) -> Result<()>;
}

/// One client per resource kind for a single project
pub trait ComputeCloud: Send + Sync {
    fn project(&self) -> &str;

    fn regions(&self) -> &dyn ResourceClient<Region>;
    fn zones(&self) -> &dyn ResourceClient<Zone>;

    fn networks(&self) -> &dyn ResourceClient<Network>;
    fn routers(&self) -> &dyn ResourceClient<Router>;
    fn subnetworks(&self) -> &dyn ResourceClient<Subnetwork>;
    fn firewalls(&self) -> &dyn ResourceClient<Firewall>;

    fn addresses(&self) -> &dyn ResourceClient<Address>;
    fn health_checks(&self) -> &dyn ResourceClient<HealthCheck>;
    fn backend_services(&self) -> &dyn ResourceClient<BackendService>;
    fn instance_groups(&self) -> &dyn InstanceGroupClient;
    fn target_tcp_proxies(&self) -> &dyn ResourceClient<TargetTcpProxy>;
    fn forwarding_rules(&self) -> &dyn ResourceClient<ForwardingRule>;

    fn instances(&self) -> &dyn ResourceClient<Instance>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_expression() {
        assert_eq!(Filter::None.expression(), None);
        assert_eq!(
            Filter::eq("region", "https://x/regions/us-east1").expression(),
            Some("region eq https://x/regions/us-east1".to_string())
        );
    }
}
