//! Network, NAT router and subnetwork reconciliation

use infra_api::compute::{Network, Router, SecondaryRange, Subnetwork};
use infra_api::is_owned_by;
use tracing::{debug, info};

use super::NetworkOutput;
use crate::cloud::ComputeCloud;
use crate::context::CallContext;
use crate::ensure::{delete_if_exists, ensure, find};
use crate::scope::ClusterScope;
use crate::Result;

/// Union of two secondary range lists keyed by range name.
///
/// Existing entries keep their position and CIDR; desired entries with a new
/// name are appended in order.
pub fn merge_secondary_ranges(
    existing: &[SecondaryRange],
    desired: &[SecondaryRange],
) -> Vec<SecondaryRange> {
    let mut merged = existing.to_vec();
    for range in desired {
        if !merged.iter().any(|r| r.range_name == range.range_name) {
            merged.push(range.clone());
        }
    }
    merged
}

/// Existing ranges minus every range name listed in `ours`
pub fn subtract_secondary_ranges(
    existing: &[SecondaryRange],
    ours: &[SecondaryRange],
) -> Vec<SecondaryRange> {
    existing
        .iter()
        .filter(|r| !ours.iter().any(|o| o.range_name == r.range_name))
        .cloned()
        .collect()
}

pub struct NetworkService<'a> {
    cloud: &'a dyn ComputeCloud,
    scope: &'a ClusterScope,
}

impl<'a> NetworkService<'a> {
    pub fn new(cloud: &'a dyn ComputeCloud, scope: &'a ClusterScope) -> Self {
        Self { cloud, scope }
    }

    pub async fn reconcile(&self, ctx: &CallContext) -> Result<NetworkOutput> {
        let network = self.create_or_get_network(ctx).await?;

        let mut output = NetworkOutput {
            self_link: Some(network.self_link.clone()),
            router: None,
        };

        if is_owned_by(&network, &self.scope.name) {
            let router = self.create_or_get_router(ctx, &network).await?;
            output.router = Some(router.self_link);
        } else {
            info!(
                network = %network.name,
                cluster = %self.scope.name,
                "Network is not managed by this cluster, skipping NAT router"
            );
        }

        for subnet in &self.scope.subnets {
            self.create_or_patch_subnet(ctx, &network, subnet).await?;
        }

        Ok(output)
    }

    /// Tears down subnets, router and network in that order. Resources that
    /// belong to someone else are left in place.
    pub async fn delete(&self, ctx: &CallContext) -> Result<()> {
        for subnet in &self.scope.subnets {
            self.delete_or_restore_subnet(ctx, subnet).await?;
        }

        let network_key = self.scope.network_key();
        let Some(network) = find::<Network, _>(ctx, self.cloud.networks(), &network_key).await?
        else {
            debug!(key = %network_key, "Network already deleted");
            return Ok(());
        };

        if !is_owned_by(&network, &self.scope.name) {
            info!(
                network = %network.name,
                cluster = %self.scope.name,
                "Network is not managed by this cluster, leaving it in place"
            );
            return Ok(());
        }

        let router_key = self.scope.router_key();
        if let Some(router) = find::<Router, _>(ctx, self.cloud.routers(), &router_key).await? {
            if is_owned_by(&router, &self.scope.name) {
                delete_if_exists::<Router, _>(ctx, self.cloud.routers(), &router_key).await?;
            } else {
                info!(router = %router.name, "Router is not managed by this cluster, leaving it in place");
            }
        }

        delete_if_exists::<Network, _>(ctx, self.cloud.networks(), &network_key).await
    }

    async fn create_or_get_network(&self, ctx: &CallContext) -> Result<Network> {
        ensure(
            ctx,
            self.cloud.networks(),
            &self.scope.network_key(),
            &self.scope.network,
        )
        .await
    }

    async fn create_or_get_router(&self, ctx: &CallContext, network: &Network) -> Result<Router> {
        let mut spec = self.scope.router.clone();
        spec.network = network.self_link.clone();
        spec.description = self.scope.tag();

        ensure(ctx, self.cloud.routers(), &self.scope.router_key(), &spec).await
    }

    async fn create_or_patch_subnet(
        &self,
        ctx: &CallContext,
        network: &Network,
        desired: &Subnetwork,
    ) -> Result<()> {
        let key = self.scope.subnet_key(desired);
        let mut spec = desired.clone();
        spec.network = network.self_link.clone();
        spec.description = self.scope.tag();

        let observed = ensure(ctx, self.cloud.subnetworks(), &key, &spec).await?;

        let merged = merge_secondary_ranges(&observed.secondary_ip_ranges, &desired.secondary_ip_ranges);
        if merged == observed.secondary_ip_ranges {
            return Ok(());
        }

        info!(
            key = %key,
            ranges = merged.len(),
            "Adding secondary ranges to subnetwork"
        );
        let patch = Subnetwork {
            secondary_ip_ranges: merged,
            ..observed
        };
        self.cloud.subnetworks().patch(ctx, &key, &patch).await
    }

    async fn delete_or_restore_subnet(&self, ctx: &CallContext, desired: &Subnetwork) -> Result<()> {
        let key = self.scope.subnet_key(desired);
        let Some(observed) = find::<Subnetwork, _>(ctx, self.cloud.subnetworks(), &key).await?
        else {
            return Ok(());
        };

        if is_owned_by(&observed, &self.scope.name) {
            return delete_if_exists::<Subnetwork, _>(ctx, self.cloud.subnetworks(), &key).await;
        }

        let remaining =
            subtract_secondary_ranges(&observed.secondary_ip_ranges, &desired.secondary_ip_ranges);
        if remaining == observed.secondary_ip_ranges {
            return Ok(());
        }

        info!(key = %key, "Removing secondary ranges from subnetwork");
        let patch = Subnetwork {
            secondary_ip_ranges: remaining,
            ..observed
        };
        self.cloud.subnetworks().patch(ctx, &key, &patch).await
    }
}
