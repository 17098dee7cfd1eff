//! Machine instances and control plane instance group membership

use async_trait::async_trait;
use infra_api::compute::{Instance, InstanceState, InstanceStatus};
use infra_api::v1alpha4::MachineAddress;
use tracing::{debug, error, info};

use super::MachineOutput;
use crate::cloud::ComputeCloud;
use crate::context::CallContext;
use crate::ensure::{delete_if_exists, ensure, find};
use crate::scope::MachineScope;
use crate::{Error, Result};

/// Metadata key the bootstrap payload is stored under
pub const USER_DATA_KEY: &str = "user-data";

/// Supplies the opaque init payload for a new instance
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BootstrapDataSource: Send + Sync {
    async fn bootstrap_data(&self, ctx: &CallContext) -> Result<String>;
}

/// Node addresses in interface order: the internal address of an interface
/// comes before the external addresses of its access configs
pub fn instance_addresses(instance: &Instance) -> Vec<MachineAddress> {
    let mut addresses = Vec::new();
    for iface in &instance.network_interfaces {
        if !iface.network_ip.is_empty() {
            addresses.push(MachineAddress::internal(&iface.network_ip));
        }
        for config in &iface.access_configs {
            if !config.nat_ip.is_empty() {
                addresses.push(MachineAddress::external(&config.nat_ip));
            }
        }
    }
    addresses
}

pub struct InstanceService<'a> {
    cloud: &'a dyn ComputeCloud,
    scope: &'a MachineScope,
}

impl<'a> InstanceService<'a> {
    pub fn new(cloud: &'a dyn ComputeCloud, scope: &'a MachineScope) -> Self {
        Self { cloud, scope }
    }

    pub async fn reconcile(
        &self,
        ctx: &CallContext,
        bootstrap: &dyn BootstrapDataSource,
    ) -> Result<MachineOutput> {
        let instance = self.create_or_get_instance(ctx, bootstrap).await?;

        let output = MachineOutput {
            provider_id: self.scope.provider_id(),
            addresses: instance_addresses(&instance),
            instance_status: instance.status,
            instance_self_link: instance.self_link.clone(),
        };

        if self.scope.is_control_plane() {
            self.register_control_plane_instance(ctx, &instance).await?;
        }

        Ok(output)
    }

    pub async fn delete(&self, ctx: &CallContext) -> Result<()> {
        let key = self.scope.instance_key();
        let Some(instance) = find::<Instance, _>(ctx, self.cloud.instances(), &key).await? else {
            debug!(key = %key, "Instance already deleted");
            return Ok(());
        };

        if self.scope.is_control_plane() {
            self.deregister_control_plane_instance(ctx, &instance).await?;
        }

        delete_if_exists::<Instance, _>(ctx, self.cloud.instances(), &key).await
    }

    async fn create_or_get_instance(
        &self,
        ctx: &CallContext,
        bootstrap: &dyn BootstrapDataSource,
    ) -> Result<Instance> {
        debug!(machine = %self.scope.name, "Getting bootstrap data for machine");
        let data = bootstrap.bootstrap_data(ctx).await.map_err(|e| {
            error!(machine = %self.scope.name, error = %e, "Error getting bootstrap data for machine");
            Error::precondition("failed to retrieve bootstrap data", e)
        })?;

        let mut spec = self.scope.instance.clone();
        spec.metadata.set(USER_DATA_KEY, data);

        ensure(ctx, self.cloud.instances(), &self.scope.instance_key(), &spec).await
    }

    /// Current members of the zone's control plane group. A group that does
    /// not exist yet has no members.
    async fn group_members(&self, ctx: &CallContext, state: InstanceState) -> Result<Option<Vec<String>>> {
        let key = self.scope.control_plane_group_key();
        match self.cloud.instance_groups().list_instances(ctx, &key, state).await {
            Ok(members) => Ok(Some(members.into_iter().map(|m| m.instance).collect())),
            Err(e) if e.is_not_found() => {
                info!(group = %key, "Control plane instance group does not exist yet");
                Ok(None)
            }
            Err(e) => {
                error!(group = %key, error = %e, "Error listing instances in the instance group");
                Err(e)
            }
        }
    }

    async fn register_control_plane_instance(&self, ctx: &CallContext, instance: &Instance) -> Result<()> {
        let key = self.scope.control_plane_group_key();
        debug!(instance = %instance.name, group = %key, "Ensuring instance is registered in the instance group");
        let Some(members) = self.group_members(ctx, InstanceState::Running).await? else {
            return Ok(());
        };

        if members.contains(&instance.self_link) {
            return Ok(());
        }
        if instance.status != Some(InstanceStatus::Running) {
            debug!(
                instance = %instance.name,
                status = ?instance.status,
                "Instance is not running yet, deferring registration"
            );
            return Ok(());
        }

        info!(instance = %instance.name, group = %key, "Registering instance in the instance group");
        self.cloud
            .instance_groups()
            .add_instances(ctx, &key, std::slice::from_ref(&instance.self_link))
            .await
    }

    async fn deregister_control_plane_instance(&self, ctx: &CallContext, instance: &Instance) -> Result<()> {
        let key = self.scope.control_plane_group_key();
        let Some(members) = self.group_members(ctx, InstanceState::All).await? else {
            return Ok(());
        };

        if !members.contains(&instance.self_link) {
            return Ok(());
        }

        info!(instance = %instance.name, group = %key, "Deregistering instance from the instance group");
        self.cloud
            .instance_groups()
            .remove_instances(ctx, &key, std::slice::from_ref(&instance.self_link))
            .await
    }
}
