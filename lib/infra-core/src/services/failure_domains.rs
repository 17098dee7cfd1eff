//! Discovery of the zones a cluster spreads its control plane over

use infra_api::compute::{Region, Zone};
use infra_api::{ResourceKey, Scope};
use tracing::{debug, warn};

use crate::cloud::{ComputeCloud, Filter};
use crate::context::CallContext;
use crate::scope::ClusterScope;
use crate::Result;

pub struct FailureDomainService<'a> {
    cloud: &'a dyn ComputeCloud,
    scope: &'a ClusterScope,
}

impl<'a> FailureDomainService<'a> {
    pub fn new(cloud: &'a dyn ComputeCloud, scope: &'a ClusterScope) -> Self {
        Self { cloud, scope }
    }

    /// Zones of the cluster region, narrowed to the requested failure
    /// domains when any are set. Provider order is kept.
    pub async fn reconcile(&self, ctx: &CallContext) -> Result<Vec<String>> {
        ctx.check()?;
        let region: Region = self
            .cloud
            .regions()
            .get(ctx, &ResourceKey::global(&self.scope.region))
            .await?;

        let zones: Vec<Zone> = self
            .cloud
            .zones()
            .list(ctx, &Scope::Global, &Filter::eq("region", &region.self_link))
            .await?;

        let requested = &self.scope.failure_domains;
        let domains: Vec<String> = zones
            .into_iter()
            .map(|z| z.name)
            .filter(|name| requested.is_empty() || requested.contains(name))
            .collect();

        for zone in requested {
            if !domains.contains(zone) {
                warn!(zone = %zone, region = %self.scope.region, "Requested failure domain is not in the cluster region");
            }
        }
        debug!(region = %self.scope.region, failure_domains = ?domains, "Discovered failure domains");
        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{cluster_scope, FakeCloud};

    #[tokio::test]
    async fn test_all_zones_of_region() {
        let cloud = FakeCloud::new();
        cloud.seed_region("us-east1", &["us-east1-b", "us-east1-c", "us-east1-d"]);
        cloud.seed_region("europe-west1", &["europe-west1-b"]);
        let scope = cluster_scope();

        let domains = FailureDomainService::new(&cloud, &scope)
            .reconcile(&CallContext::background())
            .await
            .unwrap();

        assert_eq!(domains, vec!["us-east1-b", "us-east1-c", "us-east1-d"]);
    }

    #[tokio::test]
    async fn test_requested_domains_are_intersected() {
        let cloud = FakeCloud::new();
        cloud.seed_region("us-east1", &["us-east1-b", "us-east1-c", "us-east1-d"]);
        let mut scope = cluster_scope();
        scope.failure_domains = vec!["us-east1-d".to_string(), "us-west1-a".to_string()];

        let domains = FailureDomainService::new(&cloud, &scope)
            .reconcile(&CallContext::background())
            .await
            .unwrap();

        assert_eq!(domains, vec!["us-east1-d"]);
    }

    #[tokio::test]
    async fn test_missing_region_is_an_error() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();

        let err = FailureDomainService::new(&cloud, &scope)
            .reconcile(&CallContext::background())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
