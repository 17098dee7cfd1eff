//! Capability implementations backed by the REST client

use async_trait::async_trait;
use infra_api::compute::{
    collection_path, resource_path, Address, BackendService, ComputeResource, Firewall,
    ForwardingRule, HealthCheck, Instance, InstanceGroup, InstanceState, InstanceWithNamedPorts,
    Network, Region, Router, Subnetwork, TargetTcpProxy, Zone,
};
use infra_api::{ResourceKey, Scope};
use infra_core::{
    CallContext, ComputeCloud, Filter, InstanceGroupClient, ResourceClient, Result,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::client::{GceClient, Target};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl<T> ListResponse<T> {
    fn next_page(&self) -> Option<String> {
        self.next_page_token.clone().filter(|t| !t.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListInstancesRequest {
    instance_state: InstanceState,
}

#[derive(Serialize)]
struct InstanceReference<'a> {
    instance: &'a str,
}

#[derive(Serialize)]
struct InstancesRequest<'a> {
    instances: Vec<InstanceReference<'a>>,
}

impl<'a> InstancesRequest<'a> {
    fn new(links: &'a [String]) -> Self {
        Self {
            instances: links
                .iter()
                .map(|l| InstanceReference { instance: l })
                .collect(),
        }
    }
}

/// REST client for one resource kind
pub struct GceResource<T> {
    client: GceClient,
    _kind: PhantomData<fn() -> T>,
}

impl<T: ComputeResource> GceResource<T> {
    pub fn new(client: GceClient) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn resource_url(&self, key: &ResourceKey) -> String {
        self.client.url(&resource_path::<T>(key))
    }
}

#[async_trait]
impl<T: ComputeResource> ResourceClient<T> for GceResource<T> {
    async fn get(&self, ctx: &CallContext, key: &ResourceKey) -> Result<T> {
        let key_str = key.to_string();
        self.client
            .get(ctx, &self.resource_url(key), &[], Target { kind: T::KIND, key: &key_str })
            .await
    }

    async fn insert(&self, ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        let key_str = key.to_string();
        let url = self.client.url(&collection_path::<T>(key.scope()));
        self.client
            .mutate(ctx, Method::POST, &url, Some(obj), Target { kind: T::KIND, key: &key_str })
            .await
    }

    async fn update(&self, ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        let key_str = key.to_string();
        self.client
            .mutate(ctx, Method::PUT, &self.resource_url(key), Some(obj), Target { kind: T::KIND, key: &key_str })
            .await
    }

    async fn patch(&self, ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        let key_str = key.to_string();
        self.client
            .mutate(ctx, Method::PATCH, &self.resource_url(key), Some(obj), Target { kind: T::KIND, key: &key_str })
            .await
    }

    async fn delete(&self, ctx: &CallContext, key: &ResourceKey) -> Result<()> {
        let key_str = key.to_string();
        self.client
            .mutate::<()>(ctx, Method::DELETE, &self.resource_url(key), None, Target { kind: T::KIND, key: &key_str })
            .await
    }

    async fn list(&self, ctx: &CallContext, scope: &Scope, filter: &Filter) -> Result<Vec<T>> {
        let url = self.client.url(&collection_path::<T>(scope));
        let scope_str = scope.path();
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = Vec::new();
            if let Some(expression) = filter.expression() {
                query.push(("filter", expression));
            }
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: ListResponse<T> = self
                .client
                .get(ctx, &url, &query, Target { kind: T::KIND, key: &scope_str })
                .await?;
            page_token = page.next_page();
            items.extend(page.items);

            if page_token.is_none() {
                return Ok(items);
            }
        }
    }
}

/// Instance groups plus their membership calls
pub struct GceInstanceGroups {
    groups: GceResource<InstanceGroup>,
}

impl GceInstanceGroups {
    pub fn new(client: GceClient) -> Self {
        Self {
            groups: GceResource::new(client),
        }
    }

    async fn change_members(
        &self,
        ctx: &CallContext,
        key: &ResourceKey,
        verb: &str,
        instances: &[String],
    ) -> Result<()> {
        let key_str = key.to_string();
        let url = format!("{}/{}", self.groups.resource_url(key), verb);
        self.groups
            .client
            .mutate(
                ctx,
                Method::POST,
                &url,
                Some(&InstancesRequest::new(instances)),
                Target { kind: InstanceGroup::KIND, key: &key_str },
            )
            .await
    }
}

#[async_trait]
impl ResourceClient<InstanceGroup> for GceInstanceGroups {
    async fn get(&self, ctx: &CallContext, key: &ResourceKey) -> Result<InstanceGroup> {
        self.groups.get(ctx, key).await
    }

    async fn insert(&self, ctx: &CallContext, key: &ResourceKey, obj: &InstanceGroup) -> Result<()> {
        self.groups.insert(ctx, key, obj).await
    }

    async fn delete(&self, ctx: &CallContext, key: &ResourceKey) -> Result<()> {
        self.groups.delete(ctx, key).await
    }

    async fn list(&self, ctx: &CallContext, scope: &Scope, filter: &Filter) -> Result<Vec<InstanceGroup>> {
        self.groups.list(ctx, scope, filter).await
    }
}

#[async_trait]
impl InstanceGroupClient for GceInstanceGroups {
    async fn list_instances(
        &self,
        ctx: &CallContext,
        key: &ResourceKey,
        state: InstanceState,
    ) -> Result<Vec<InstanceWithNamedPorts>> {
        let key_str = key.to_string();
        let url = format!("{}/listInstances", self.groups.resource_url(key));
        let body = ListInstancesRequest {
            instance_state: state,
        };
        let mut members = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page: ListResponse<InstanceWithNamedPorts> = self
                .groups
                .client
                .call(
                    ctx,
                    Method::POST,
                    &url,
                    &query,
                    Some(&body),
                    Target { kind: InstanceGroup::KIND, key: &key_str },
                )
                .await?;
            page_token = page.next_page();
            members.extend(page.items);

            if page_token.is_none() {
                return Ok(members);
            }
        }
    }

    async fn add_instances(&self, ctx: &CallContext, key: &ResourceKey, instances: &[String]) -> Result<()> {
        self.change_members(ctx, key, "addInstances", instances).await
    }

    async fn remove_instances(&self, ctx: &CallContext, key: &ResourceKey, instances: &[String]) -> Result<()> {
        self.change_members(ctx, key, "removeInstances", instances).await
    }
}

/// Every resource client for one project
pub struct GceCloud {
    project: String,
    regions: GceResource<Region>,
    zones: GceResource<Zone>,
    networks: GceResource<Network>,
    routers: GceResource<Router>,
    subnetworks: GceResource<Subnetwork>,
    firewalls: GceResource<Firewall>,
    addresses: GceResource<Address>,
    health_checks: GceResource<HealthCheck>,
    backend_services: GceResource<BackendService>,
    instance_groups: GceInstanceGroups,
    target_tcp_proxies: GceResource<TargetTcpProxy>,
    forwarding_rules: GceResource<ForwardingRule>,
    instances: GceResource<Instance>,
}

impl GceCloud {
    pub fn new(client: GceClient) -> Self {
        Self {
            project: client.project().to_string(),
            regions: GceResource::new(client.clone()),
            zones: GceResource::new(client.clone()),
            networks: GceResource::new(client.clone()),
            routers: GceResource::new(client.clone()),
            subnetworks: GceResource::new(client.clone()),
            firewalls: GceResource::new(client.clone()),
            addresses: GceResource::new(client.clone()),
            health_checks: GceResource::new(client.clone()),
            backend_services: GceResource::new(client.clone()),
            instance_groups: GceInstanceGroups::new(client.clone()),
            target_tcp_proxies: GceResource::new(client.clone()),
            forwarding_rules: GceResource::new(client.clone()),
            instances: GceResource::new(client),
        }
    }
}

impl ComputeCloud for GceCloud {
    fn project(&self) -> &str {
        &self.project
    }

    fn regions(&self) -> &dyn ResourceClient<Region> {
        &self.regions
    }

    fn zones(&self) -> &dyn ResourceClient<Zone> {
        &self.zones
    }

    fn networks(&self) -> &dyn ResourceClient<Network> {
        &self.networks
    }

    fn routers(&self) -> &dyn ResourceClient<Router> {
        &self.routers
    }

    fn subnetworks(&self) -> &dyn ResourceClient<Subnetwork> {
        &self.subnetworks
    }

    fn firewalls(&self) -> &dyn ResourceClient<Firewall> {
        &self.firewalls
    }

    fn addresses(&self) -> &dyn ResourceClient<Address> {
        &self.addresses
    }

    fn health_checks(&self) -> &dyn ResourceClient<HealthCheck> {
        &self.health_checks
    }

    fn backend_services(&self) -> &dyn ResourceClient<BackendService> {
        &self.backend_services
    }

    fn instance_groups(&self) -> &dyn InstanceGroupClient {
        &self.instance_groups
    }

    fn target_tcp_proxies(&self) -> &dyn ResourceClient<TargetTcpProxy> {
        &self.target_tcp_proxies
    }

    fn forwarding_rules(&self) -> &dyn ResourceClient<ForwardingRule> {
        &self.forwarding_rules
    }

    fn instances(&self) -> &dyn ResourceClient<Instance> {
        &self.instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_paging() {
        let page: ListResponse<Zone> = serde_json::from_str(
            r#"{"kind":"compute#zoneList","items":[{"name":"us-east1-b","region":"https://x/regions/us-east1"}],"nextPageToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(page.items[0].name, "us-east1-b");
        assert_eq!(page.next_page(), Some("abc".to_string()));

        let last: ListResponse<Zone> = serde_json::from_str(r#"{"kind":"compute#zoneList"}"#).unwrap();
        assert!(last.items.is_empty());
        assert_eq!(last.next_page(), None);
    }

    #[test]
    fn test_membership_request_bodies() {
        let links = vec!["https://x/zones/us-east1-b/instances/vm-0".to_string()];
        assert_eq!(
            serde_json::to_value(InstancesRequest::new(&links)).unwrap(),
            serde_json::json!({"instances": [{"instance": "https://x/zones/us-east1-b/instances/vm-0"}]})
        );
        assert_eq!(
            serde_json::to_value(ListInstancesRequest {
                instance_state: InstanceState::Running
            })
            .unwrap(),
            serde_json::json!({"instanceState": "RUNNING"})
        );
    }

    #[test]
    fn test_members_deserialize() {
        let page: ListResponse<InstanceWithNamedPorts> = serde_json::from_str(
            r#"{"items":[{"instance":"https://x/instances/vm-0","status":"RUNNING","namedPorts":[]}]}"#,
        )
        .unwrap();
        assert_eq!(page.items[0].instance, "https://x/instances/vm-0");
    }
}
