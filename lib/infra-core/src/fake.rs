//! In-memory ComputeCloud for tests
//!
//! Every call is journaled so tests can assert which mutations happened.
//! Failures can be injected per (kind, verb).

use async_trait::async_trait;
use infra_api::compute::{
    resource_path, Address, BackendService, ComputeResource, Firewall, ForwardingRule,
    HealthCheck, Instance, InstanceGroup, InstanceState, InstanceStatus, InstanceWithNamedPorts,
    Network, Region, Router, Subnetwork, TargetTcpProxy, Zone,
};
use infra_api::v1alpha4::{GCPCluster, GCPClusterSpec, NetworkSpec, SubnetSpec};
use infra_api::{ResourceKey, Scope};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::cloud::{ComputeCloud, Filter, InstanceGroupClient, ResourceClient};
use crate::context::CallContext;
use crate::scope::ClusterScope;
use crate::{Error, Result};

pub const PROJECT: &str = "test-project";
const API_BASE: &str = "https://www.googleapis.com/compute/v1/projects";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Insert,
    Update,
    Patch,
    Delete,
    List,
    ListInstances,
    AddInstances,
    RemoveInstances,
}

impl Verb {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Verb::Get | Verb::List | Verb::ListInstances)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub kind: &'static str,
    pub verb: Verb,
    pub key: String,
}

#[derive(Default)]
struct Shared {
    journal: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<(&'static str, Verb), u16>>,
}

impl Shared {
    fn record(&self, kind: &'static str, verb: Verb, key: String) -> Result<()> {
        self.journal.lock().unwrap().push(Call { kind, verb, key });
        match self.failures.lock().unwrap().get(&(kind, verb)) {
            Some(&code) => Err(Error::Api {
                code,
                message: format!("injected failure for {:?} {}", verb, kind),
            }),
            None => Ok(()),
        }
    }
}

pub fn self_link<T: ComputeResource>(key: &ResourceKey) -> String {
    format!("{}/{}/{}", API_BASE, PROJECT, resource_path::<T>(key))
}

type InsertHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

pub struct FakeResource<T> {
    items: Mutex<BTreeMap<ResourceKey, T>>,
    shared: Arc<Shared>,
    on_insert: Option<InsertHook<T>>,
}

impl<T: ComputeResource> FakeResource<T> {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            shared,
            on_insert: None,
        }
    }

    fn with_on_insert(mut self, hook: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Box::new(hook));
        self
    }

    /// Stores a resource without journaling, as if another actor created it
    pub fn seed(&self, key: &ResourceKey, mut obj: T) {
        if obj.self_link().is_empty() {
            obj.set_self_link(self_link::<T>(key));
        }
        self.items.lock().unwrap().insert(key.clone(), obj);
    }

    pub fn stored(&self, key: &ResourceKey) -> Option<T> {
        self.items.lock().unwrap().get(key).cloned()
    }

    pub fn modify(&self, key: &ResourceKey, f: impl FnOnce(&mut T)) {
        if let Some(obj) = self.items.lock().unwrap().get_mut(key) {
            f(obj);
        }
    }

    pub fn remove(&self, key: &ResourceKey) {
        self.items.lock().unwrap().remove(key);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    fn record(&self, verb: Verb, key: &ResourceKey) -> Result<()> {
        self.shared.record(T::KIND, verb, key.to_string())
    }

    fn replace(&self, key: &ResourceKey, obj: &T) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let existing = items
            .get_mut(key)
            .ok_or_else(|| Error::not_found(T::KIND, key))?;
        let link = existing.self_link().to_string();
        *existing = obj.clone();
        existing.set_self_link(link);
        Ok(())
    }
}

fn filter_matches<T: ComputeResource>(obj: &T, filter: &Filter) -> bool {
    match filter {
        Filter::None => true,
        Filter::Eq { field, value } => serde_json::to_value(obj)
            .ok()
            .and_then(|json| json.get(field).and_then(|v| v.as_str().map(str::to_owned)))
            .map(|actual| &actual == value)
            .unwrap_or(false),
    }
}

#[async_trait]
impl<T: ComputeResource> ResourceClient<T> for FakeResource<T> {
    async fn get(&self, _ctx: &CallContext, key: &ResourceKey) -> Result<T> {
        self.record(Verb::Get, key)?;
        self.stored(key).ok_or_else(|| Error::not_found(T::KIND, key))
    }

    async fn insert(&self, _ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        self.record(Verb::Insert, key)?;
        let mut items = self.items.lock().unwrap();
        if items.contains_key(key) {
            return Err(Error::Api {
                code: 409,
                message: format!("{} {} already exists", T::KIND, key),
            });
        }
        let mut obj = obj.clone();
        obj.set_self_link(self_link::<T>(key));
        if let Some(hook) = &self.on_insert {
            hook(&mut obj);
        }
        items.insert(key.clone(), obj);
        Ok(())
    }

    async fn update(&self, _ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        self.record(Verb::Update, key)?;
        self.replace(key, obj)
    }

    async fn patch(&self, _ctx: &CallContext, key: &ResourceKey, obj: &T) -> Result<()> {
        self.record(Verb::Patch, key)?;
        self.replace(key, obj)
    }

    async fn delete(&self, _ctx: &CallContext, key: &ResourceKey) -> Result<()> {
        self.record(Verb::Delete, key)?;
        self.items
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(T::KIND, key))
    }

    async fn list(&self, _ctx: &CallContext, scope: &Scope, filter: &Filter) -> Result<Vec<T>> {
        self.shared.record(T::KIND, Verb::List, scope.path())?;
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, obj)| key.scope() == scope && filter_matches(*obj, filter))
            .map(|(_, obj)| obj.clone())
            .collect())
    }
}

pub struct FakeInstanceGroups {
    groups: FakeResource<InstanceGroup>,
    members: Mutex<HashMap<ResourceKey, Vec<InstanceWithNamedPorts>>>,
}

impl FakeInstanceGroups {
    pub fn seed(&self, key: &ResourceKey, group: InstanceGroup) {
        self.groups.seed(key, group);
    }

    pub fn stored(&self, key: &ResourceKey) -> Option<InstanceGroup> {
        self.groups.stored(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn seed_member(&self, key: &ResourceKey, instance: &str, status: InstanceStatus) {
        self.members
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push(InstanceWithNamedPorts {
                instance: instance.to_string(),
                status: Some(status),
            });
    }

    pub fn members(&self, key: &ResourceKey) -> Vec<String> {
        self.members
            .lock()
            .unwrap()
            .get(key)
            .map(|m| m.iter().map(|i| i.instance.clone()).collect())
            .unwrap_or_default()
    }

    fn require_group(&self, key: &ResourceKey) -> Result<()> {
        match self.groups.stored(key) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(InstanceGroup::KIND, key)),
        }
    }
}

#[async_trait]
impl ResourceClient<InstanceGroup> for FakeInstanceGroups {
    async fn get(&self, ctx: &CallContext, key: &ResourceKey) -> Result<InstanceGroup> {
        self.groups.get(ctx, key).await
    }

    async fn insert(&self, ctx: &CallContext, key: &ResourceKey, obj: &InstanceGroup) -> Result<()> {
        self.groups.insert(ctx, key, obj).await
    }

    async fn delete(&self, ctx: &CallContext, key: &ResourceKey) -> Result<()> {
        self.groups.delete(ctx, key).await?;
        self.members.lock().unwrap().remove(key);
        Ok(())
    }
}

#[async_trait]
impl InstanceGroupClient for FakeInstanceGroups {
    async fn list_instances(
        &self,
        _ctx: &CallContext,
        key: &ResourceKey,
        state: InstanceState,
    ) -> Result<Vec<InstanceWithNamedPorts>> {
        self.groups.record(Verb::ListInstances, key)?;
        self.require_group(key)?;
        let members = self.members.lock().unwrap();
        Ok(members
            .get(key)
            .map(|m| {
                m.iter()
                    .filter(|i| {
                        state == InstanceState::All || i.status == Some(InstanceStatus::Running)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_instances(
        &self,
        _ctx: &CallContext,
        key: &ResourceKey,
        instances: &[String],
    ) -> Result<()> {
        self.groups.record(Verb::AddInstances, key)?;
        self.require_group(key)?;
        let mut members = self.members.lock().unwrap();
        let entry = members.entry(key.clone()).or_default();
        for instance in instances {
            if entry.iter().any(|m| &m.instance == instance) {
                return Err(Error::Api {
                    code: 400,
                    message: format!("{} is already a member of {}", instance, key),
                });
            }
            entry.push(InstanceWithNamedPorts {
                instance: instance.clone(),
                status: Some(InstanceStatus::Running),
            });
        }
        Ok(())
    }

    async fn remove_instances(
        &self,
        _ctx: &CallContext,
        key: &ResourceKey,
        instances: &[String],
    ) -> Result<()> {
        self.groups.record(Verb::RemoveInstances, key)?;
        self.require_group(key)?;
        if let Some(entry) = self.members.lock().unwrap().get_mut(key) {
            entry.retain(|m| !instances.contains(&m.instance));
        }
        Ok(())
    }
}

pub const FAKE_ADDRESS_IP: &str = "203.0.113.10";

pub struct FakeCloud {
    shared: Arc<Shared>,
    pub regions: FakeResource<Region>,
    pub zones: FakeResource<Zone>,
    pub networks: FakeResource<Network>,
    pub routers: FakeResource<Router>,
    pub subnetworks: FakeResource<Subnetwork>,
    pub firewalls: FakeResource<Firewall>,
    pub addresses: FakeResource<Address>,
    pub health_checks: FakeResource<HealthCheck>,
    pub backend_services: FakeResource<BackendService>,
    pub instance_groups: FakeInstanceGroups,
    pub target_tcp_proxies: FakeResource<TargetTcpProxy>,
    pub forwarding_rules: FakeResource<ForwardingRule>,
    pub instances: FakeResource<Instance>,
}

impl FakeCloud {
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        Self {
            regions: FakeResource::new(shared.clone()),
            zones: FakeResource::new(shared.clone()),
            networks: FakeResource::new(shared.clone()),
            routers: FakeResource::new(shared.clone()),
            subnetworks: FakeResource::new(shared.clone()),
            firewalls: FakeResource::new(shared.clone()),
            addresses: FakeResource::new(shared.clone()).with_on_insert(|address: &mut Address| {
                address.address = FAKE_ADDRESS_IP.to_string();
            }),
            health_checks: FakeResource::new(shared.clone()),
            backend_services: FakeResource::new(shared.clone()),
            instance_groups: FakeInstanceGroups {
                groups: FakeResource::new(shared.clone()),
                members: Mutex::new(HashMap::new()),
            },
            target_tcp_proxies: FakeResource::new(shared.clone()),
            forwarding_rules: FakeResource::new(shared.clone()),
            instances: FakeResource::new(shared.clone()).with_on_insert(|instance: &mut Instance| {
                instance.status = Some(InstanceStatus::Provisioning);
                for (i, iface) in instance.network_interfaces.iter_mut().enumerate() {
                    iface.network_ip = format!("10.0.0.{}", i + 2);
                }
            }),
            shared,
        }
    }

    /// Seeds `region` with the given zones
    pub fn seed_region(&self, region: &str, zones: &[&str]) {
        let region_key = ResourceKey::global(region);
        let region_link = self_link::<Region>(&region_key);
        self.regions.seed(
            &region_key,
            Region {
                name: region.to_string(),
                status: "UP".to_string(),
                ..Default::default()
            },
        );
        for zone in zones {
            self.zones.seed(
                &ResourceKey::global(*zone),
                Zone {
                    name: zone.to_string(),
                    region: region_link.clone(),
                    status: "UP".to_string(),
                    ..Default::default()
                },
            );
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.journal.lock().unwrap().clone()
    }

    pub fn calls_for(&self, kind: &str) -> Vec<Verb> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.verb)
            .collect()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb.is_mutation())
            .collect()
    }

    /// Kinds and verbs of every mutation, in order
    pub fn mutation_log(&self) -> Vec<(&'static str, Verb)> {
        self.mutations()
            .into_iter()
            .map(|c| (c.kind, c.verb))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.shared.journal.lock().unwrap().clear();
    }

    pub fn fail(&self, kind: &'static str, verb: Verb, code: u16) {
        self.shared
            .failures
            .lock()
            .unwrap()
            .insert((kind, verb), code);
    }

    pub fn clear_failures(&self) {
        self.shared.failures.lock().unwrap().clear();
    }
}

impl ComputeCloud for FakeCloud {
    fn project(&self) -> &str {
        PROJECT
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

pub const REGION: &str = "us-east1";

/// Scope for cluster "test": network "net1", subnet "sub1" with one secondary range
pub fn cluster_scope() -> ClusterScope {
    let cluster = GCPCluster::new(
        "test",
        GCPClusterSpec {
            project: PROJECT.to_string(),
            region: REGION.to_string(),
            network: NetworkSpec {
                name: Some("net1".to_string()),
                subnets: vec![SubnetSpec {
                    name: "sub1".to_string(),
                    cidr_block: "10.0.0.0/24".to_string(),
                    secondary_cidr_blocks: BTreeMap::from([(
                        "x".to_string(),
                        "10.1.0.0/24".to_string(),
                    )]),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        },
    );
    ClusterScope::from_cluster(&cluster).expect("valid test cluster")
}
