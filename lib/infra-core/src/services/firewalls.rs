//! Firewall rule reconciliation

use infra_api::compute::Firewall;
use infra_api::ResourceKey;
use tracing::{error, info};

use crate::cloud::ComputeCloud;
use crate::context::CallContext;
use crate::ensure::{delete_if_exists, find};
use crate::scope::ClusterScope;
use crate::Result;

pub struct FirewallService<'a> {
    cloud: &'a dyn ComputeCloud,
    scope: &'a ClusterScope,
}

impl<'a> FirewallService<'a> {
    pub fn new(cloud: &'a dyn ComputeCloud, scope: &'a ClusterScope) -> Self {
        Self { cloud, scope }
    }

    /// Inserts missing rules and overwrites rules whose managed fields drifted
    pub async fn reconcile(&self, ctx: &CallContext, network_self_link: &str) -> Result<()> {
        for desired in &self.scope.firewalls {
            let key = ResourceKey::global(&desired.name);
            let mut spec = desired.clone();
            spec.network = network_self_link.to_string();
            spec.description = self.scope.tag();

            match find::<Firewall, _>(ctx, self.cloud.firewalls(), &key).await? {
                None => {
                    info!(key = %key, "Creating firewall rule");
                    self.cloud
                        .firewalls()
                        .insert(ctx, &key, &spec)
                        .await
                        .inspect_err(|e| error!(key = %key, error = %e, "Error creating firewall rule"))?;
                }
                Some(observed) if !observed.same_rules(&spec) => {
                    info!(key = %key, "Updating firewall rule");
                    self.cloud
                        .firewalls()
                        .update(ctx, &key, &spec)
                        .await
                        .inspect_err(|e| error!(key = %key, error = %e, "Error updating firewall rule"))?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub async fn delete(&self, ctx: &CallContext) -> Result<()> {
        for desired in &self.scope.firewalls {
            delete_if_exists::<Firewall, _>(
                ctx,
                self.cloud.firewalls(),
                &ResourceKey::global(&desired.name),
            )
            .await?;
        }
        Ok(())
    }
}
