//! Cluster and machine entry points
//!
//! Create order: failure domains, network, firewalls, load balancer.
//! Delete order is the reverse. The first error stops the chain; nothing is
//! rolled back and the next call resumes from observed state.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::cloud::ComputeCloud;
use crate::context::CallContext;
use crate::scope::{ClusterScope, MachineScope};
use crate::services::instances::BootstrapDataSource;
use crate::services::{
    ClusterOutput, FailureDomainService, FirewallService, InstanceService, LoadBalancerService,
    MachineOutput, NetworkService,
};
use crate::Result;

#[derive(Clone)]
pub struct ClusterReconciler {
    cloud: Arc<dyn ComputeCloud>,
}

impl ClusterReconciler {
    pub fn new(cloud: Arc<dyn ComputeCloud>) -> Self {
        Self { cloud }
    }

    #[instrument(skip_all, fields(cluster = %scope.name))]
    pub async fn reconcile(&self, ctx: &CallContext, scope: &ClusterScope) -> Result<ClusterOutput> {
        let cloud = self.cloud.as_ref();

        let failure_domains = FailureDomainService::new(cloud, scope).reconcile(ctx).await?;
        let network = NetworkService::new(cloud, scope).reconcile(ctx).await?;
        let network_self_link = network.self_link.clone().unwrap_or_default();

        FirewallService::new(cloud, scope)
            .reconcile(ctx, &network_self_link)
            .await?;

        let load_balancer = LoadBalancerService::new(cloud, scope)
            .reconcile(ctx, &network_self_link, &failure_domains)
            .await?;

        info!(
            failure_domains = failure_domains.len(),
            endpoint = ?load_balancer.control_plane_endpoint,
            "Reconciled cluster infrastructure"
        );
        Ok(ClusterOutput {
            failure_domains,
            network,
            load_balancer,
        })
    }

    #[instrument(skip_all, fields(cluster = %scope.name))]
    pub async fn delete(&self, ctx: &CallContext, scope: &ClusterScope) -> Result<()> {
        let cloud = self.cloud.as_ref();

        let failure_domains = if scope.recorded_failure_domains.is_empty() {
            match FailureDomainService::new(cloud, scope).reconcile(ctx).await {
                Ok(domains) => domains,
                // no region, so no instance groups were ever created in it
                Err(e) if e.is_not_found() => {
                    info!(region = %scope.region, "Region not found, skipping instance group teardown");
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            scope.recorded_failure_domains.clone()
        };

        LoadBalancerService::new(cloud, scope)
            .delete(ctx, &failure_domains)
            .await?;
        FirewallService::new(cloud, scope).delete(ctx).await?;
        NetworkService::new(cloud, scope).delete(ctx).await?;

        info!("Deleted cluster infrastructure");
        Ok(())
    }
}

#[derive(Clone)]
pub struct MachineReconciler {
    cloud: Arc<dyn ComputeCloud>,
}

impl MachineReconciler {
    pub fn new(cloud: Arc<dyn ComputeCloud>) -> Self {
        Self { cloud }
    }

    #[instrument(skip_all, fields(machine = %scope.name, zone = %scope.zone))]
    pub async fn reconcile(
        &self,
        ctx: &CallContext,
        scope: &MachineScope,
        bootstrap: &dyn BootstrapDataSource,
    ) -> Result<MachineOutput> {
        InstanceService::new(self.cloud.as_ref(), scope)
            .reconcile(ctx, bootstrap)
            .await
    }

    #[instrument(skip_all, fields(machine = %scope.name, zone = %scope.zone))]
    pub async fn delete(&self, ctx: &CallContext, scope: &MachineScope) -> Result<()> {
        InstanceService::new(self.cloud.as_ref(), scope)
            .delete(ctx)
            .await
    }
}
