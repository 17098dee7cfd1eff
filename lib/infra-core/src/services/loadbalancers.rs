//! Control plane load balancer chain
//!
//! address -> health check -> backend service -> instance groups ->
//! target TCP proxy -> forwarding rule. Each step is get-or-create and
//! consumes the self-link of the step before it.

use infra_api::compute::{
    Address, Backend, BackendService, ForwardingRule, HealthCheck, InstanceGroup, TargetTcpProxy,
};
use infra_api::v1alpha4::ApiEndpoint;
use infra_api::ResourceKey;
use tracing::{error, info};

use super::LoadBalancerOutput;
use crate::cloud::ComputeCloud;
use crate::context::CallContext;
use crate::ensure::{delete_if_exists, ensure, find};
use crate::scope::{ClusterScope, FRONTEND_PORT};
use crate::Result;

const BALANCING_MODE: &str = "UTILIZATION";

pub struct LoadBalancerService<'a> {
    cloud: &'a dyn ComputeCloud,
    scope: &'a ClusterScope,
}

impl<'a> LoadBalancerService<'a> {
    pub fn new(cloud: &'a dyn ComputeCloud, scope: &'a ClusterScope) -> Self {
        Self { cloud, scope }
    }

    fn key(name: &str) -> ResourceKey {
        ResourceKey::global(name)
    }

    pub async fn reconcile(
        &self,
        ctx: &CallContext,
        network_self_link: &str,
        failure_domains: &[String],
    ) -> Result<LoadBalancerOutput> {
        let spec = &self.scope.load_balancer;
        let tag = self.scope.tag();

        let address = ensure(
            ctx,
            self.cloud.addresses(),
            &Self::key(&spec.address.name),
            &Address {
                description: tag.clone(),
                ..spec.address.clone()
            },
        )
        .await?;

        let health_check = ensure(
            ctx,
            self.cloud.health_checks(),
            &Self::key(&spec.health_check.name),
            &HealthCheck {
                description: tag.clone(),
                ..spec.health_check.clone()
            },
        )
        .await?;

        let backend_service = ensure(
            ctx,
            self.cloud.backend_services(),
            &Self::key(&spec.backend_service.name),
            &BackendService {
                description: tag.clone(),
                health_checks: vec![health_check.self_link.clone()],
                ..spec.backend_service.clone()
            },
        )
        .await?;

        let mut instance_groups = Vec::with_capacity(failure_domains.len());
        for zone in failure_domains {
            let key = self.scope.instance_group_key(zone);
            let group = ensure(
                ctx,
                self.cloud.instance_groups(),
                &key,
                &InstanceGroup {
                    name: key.name().to_string(),
                    description: tag.clone(),
                    network: network_self_link.to_string(),
                    ..spec.instance_group.clone()
                },
            )
            .await?;
            instance_groups.push(group.self_link);
        }

        let backend_service = self
            .converge_backends(ctx, backend_service, &instance_groups)
            .await?;

        let target_proxy = ensure(
            ctx,
            self.cloud.target_tcp_proxies(),
            &Self::key(&spec.target_tcp_proxy.name),
            &TargetTcpProxy {
                description: tag.clone(),
                service: backend_service.self_link.clone(),
                ..spec.target_tcp_proxy.clone()
            },
        )
        .await?;

        let forwarding_rule = ensure(
            ctx,
            self.cloud.forwarding_rules(),
            &Self::key(&spec.forwarding_rule.name),
            &ForwardingRule {
                description: tag,
                ip_address: address.address.clone(),
                target: target_proxy.self_link.clone(),
                ..spec.forwarding_rule.clone()
            },
        )
        .await?;

        let control_plane_endpoint = (!address.address.is_empty()).then(|| ApiEndpoint {
            host: address.address.clone(),
            port: i32::from(forwarding_rule.port().unwrap_or(FRONTEND_PORT)),
        });

        Ok(LoadBalancerOutput {
            control_plane_endpoint,
            instance_groups,
        })
    }

    /// Adds any instance group the backend service does not reference yet
    async fn converge_backends(
        &self,
        ctx: &CallContext,
        backend_service: BackendService,
        instance_groups: &[String],
    ) -> Result<BackendService> {
        let missing: Vec<&String> = instance_groups
            .iter()
            .filter(|group| !backend_service.backends.iter().any(|b| &b.group == *group))
            .collect();
        if missing.is_empty() {
            return Ok(backend_service);
        }

        let key = Self::key(&backend_service.name);
        info!(key = %key, groups = missing.len(), "Attaching instance groups to backend service");
        let mut updated = backend_service.clone();
        updated.backends.extend(missing.into_iter().map(|group| Backend {
            group: group.clone(),
            balancing_mode: BALANCING_MODE.to_string(),
        }));
        self.cloud
            .backend_services()
            .update(ctx, &key, &updated)
            .await
            .inspect_err(|e| error!(key = %key, error = %e, "Error updating backend service"))?;

        self.cloud.backend_services().get(ctx, &key).await
    }

    /// Empties the backend service so its instance groups can be deleted;
    /// the provider refuses to delete a group a backend still points at
    async fn detach_backends(&self, ctx: &CallContext) -> Result<()> {
        let key = Self::key(&self.scope.load_balancer.backend_service.name);
        let Some(mut backend_service) = find::<BackendService, _>(ctx, self.cloud.backend_services(), &key).await? else {
            return Ok(());
        };
        if backend_service.backends.is_empty() {
            return Ok(());
        }

        info!(key = %key, groups = backend_service.backends.len(), "Detaching instance groups from backend service");
        backend_service.backends.clear();
        self.cloud
            .backend_services()
            .update(ctx, &key, &backend_service)
            .await
            .inspect_err(|e| error!(key = %key, error = %e, "Error updating backend service"))
    }

    /// Deletes the chain in reverse, skipping pieces that never got created
    pub async fn delete(&self, ctx: &CallContext, failure_domains: &[String]) -> Result<()> {
        let spec = &self.scope.load_balancer;

        delete_if_exists::<ForwardingRule, _>(
            ctx,
            self.cloud.forwarding_rules(),
            &Self::key(&spec.forwarding_rule.name),
        )
        .await?;
        delete_if_exists::<TargetTcpProxy, _>(
            ctx,
            self.cloud.target_tcp_proxies(),
            &Self::key(&spec.target_tcp_proxy.name),
        )
        .await?;
        self.detach_backends(ctx).await?;
        for zone in failure_domains {
            delete_if_exists::<InstanceGroup, _>(
                ctx,
                self.cloud.instance_groups(),
                &self.scope.instance_group_key(zone),
            )
            .await?;
        }
        delete_if_exists::<BackendService, _>(
            ctx,
            self.cloud.backend_services(),
            &Self::key(&spec.backend_service.name),
        )
        .await?;
        delete_if_exists::<HealthCheck, _>(
            ctx,
            self.cloud.health_checks(),
            &Self::key(&spec.health_check.name),
        )
        .await?;
        delete_if_exists::<Address, _>(ctx, self.cloud.addresses(), &Self::key(&spec.address.name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{cluster_scope, FakeCloud, Verb, FAKE_ADDRESS_IP};

    const NETWORK: &str = "https://www.googleapis.com/compute/v1/projects/test-project/global/networks/net1";

    fn zones() -> Vec<String> {
        vec!["us-east1-b".to_string(), "us-east1-c".to_string()]
    }

    #[tokio::test]
    async fn test_chain_is_wired_by_self_link() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();

        let output = LoadBalancerService::new(&cloud, &scope)
            .reconcile(&CallContext::background(), NETWORK, &zones())
            .await
            .unwrap();

        let key = ResourceKey::global("test-apiserver");
        let health_check = cloud.health_checks.stored(&key).unwrap();
        let backend_service = cloud.backend_services.stored(&key).unwrap();
        let proxy = cloud.target_tcp_proxies.stored(&key).unwrap();
        let rule = cloud.forwarding_rules.stored(&key).unwrap();

        assert_eq!(backend_service.health_checks, vec![health_check.self_link]);
        assert_eq!(proxy.service, backend_service.self_link);
        assert_eq!(rule.target, proxy.self_link);
        assert_eq!(rule.ip_address, FAKE_ADDRESS_IP);

        let groups: Vec<_> = backend_service.backends.iter().map(|b| b.group.clone()).collect();
        assert_eq!(groups, output.instance_groups);
        assert_eq!(output.instance_groups.len(), 2);

        let group = cloud
            .instance_groups
            .stored(&ResourceKey::zonal("test-apiserver-us-east1-c", "us-east1-c"))
            .unwrap();
        assert_eq!(group.network, NETWORK);
        assert_eq!(group.named_ports[0].port, 6443);

        assert_eq!(
            output.control_plane_endpoint,
            Some(ApiEndpoint {
                host: FAKE_ADDRESS_IP.to_string(),
                port: 443,
            })
        );
    }

    #[tokio::test]
    async fn test_second_reconcile_only_reads() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        let service = LoadBalancerService::new(&cloud, &scope);

        let first = service.reconcile(&ctx, NETWORK, &zones()).await.unwrap();
        cloud.clear_calls();
        let second = service.reconcile(&ctx, NETWORK, &zones()).await.unwrap();

        assert!(cloud.mutations().is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_new_zone_is_attached_to_backend_service() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        let service = LoadBalancerService::new(&cloud, &scope);

        service
            .reconcile(&ctx, NETWORK, &zones()[..1])
            .await
            .unwrap();
        cloud.clear_calls();
        service.reconcile(&ctx, NETWORK, &zones()).await.unwrap();

        assert_eq!(
            cloud.mutation_log(),
            vec![("instance group", Verb::Insert), ("backend service", Verb::Update)]
        );
        let backend_service = cloud
            .backend_services
            .stored(&ResourceKey::global("test-apiserver"))
            .unwrap();
        assert_eq!(backend_service.backends.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_without_rollback() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        cloud.fail("target TCP proxy", Verb::Insert, 403);

        let err = LoadBalancerService::new(&cloud, &scope)
            .reconcile(&ctx, NETWORK, &zones())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::Error::Api { code: 403, .. }));
        assert_eq!(cloud.addresses.len(), 1);
        assert_eq!(cloud.backend_services.len(), 1);
        assert_eq!(cloud.forwarding_rules.len(), 0);
        assert!(cloud.calls_for("forwarding rule").is_empty());

        // the next attempt picks up where the last one stopped
        cloud.clear_failures();
        cloud.clear_calls();
        LoadBalancerService::new(&cloud, &scope)
            .reconcile(&ctx, NETWORK, &zones())
            .await
            .unwrap();
        assert_eq!(
            cloud.mutation_log(),
            vec![("target TCP proxy", Verb::Insert), ("forwarding rule", Verb::Insert)]
        );
    }

    #[tokio::test]
    async fn test_delete_reverses_chain() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        let service = LoadBalancerService::new(&cloud, &scope);

        service.reconcile(&ctx, NETWORK, &zones()).await.unwrap();
        cloud.clear_calls();
        service.delete(&ctx, &zones()).await.unwrap();

        assert_eq!(
            cloud.mutation_log(),
            vec![
                ("forwarding rule", Verb::Delete),
                ("target TCP proxy", Verb::Delete),
                ("backend service", Verb::Update),
                ("instance group", Verb::Delete),
                ("instance group", Verb::Delete),
                ("backend service", Verb::Delete),
                ("health check", Verb::Delete),
                ("address", Verb::Delete),
            ]
        );
        assert_eq!(cloud.instance_groups.len(), 0);
        assert_eq!(cloud.addresses.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_partial_chain() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        cloud.fail("backend service", Verb::Insert, 500);

        let service = LoadBalancerService::new(&cloud, &scope);
        assert!(service.reconcile(&ctx, NETWORK, &zones()).await.is_err());
        cloud.clear_failures();

        service.delete(&ctx, &zones()).await.unwrap();
        assert_eq!(cloud.addresses.len(), 0);
        assert_eq!(cloud.health_checks.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_detaches_groups_before_deleting_them() {
        let cloud = FakeCloud::new();
        let scope = cluster_scope();
        let ctx = CallContext::background();
        let service = LoadBalancerService::new(&cloud, &scope);
        service.reconcile(&ctx, NETWORK, &zones()).await.unwrap();

        // stop right after the groups so the emptied backend service is observable
        cloud.fail("backend service", Verb::Delete, 503);
        assert!(service.delete(&ctx, &zones()).await.is_err());

        let key = ResourceKey::global(&scope.load_balancer.backend_service.name);
        assert!(cloud.backend_services.stored(&key).unwrap().backends.is_empty());
        assert_eq!(cloud.instance_groups.len(), 0);

        // an already empty backend service is not updated again
        cloud.clear_failures();
        cloud.clear_calls();
        service.delete(&ctx, &zones()).await.unwrap();
        assert!(!cloud.mutation_log().contains(&("backend service", Verb::Update)));
        assert_eq!(cloud.backend_services.len(), 0);
    }
}
