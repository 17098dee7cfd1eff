use infra_core::{CallContext, ComputeCloud};
use infra_gce::{GceClient, GceCloud};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ReconcileError;
use crate::metrics::ReconcileMetrics;

/// State shared by both controllers
pub struct ControllerContext {
    pub client: Client,
    pub gce: GceClient,
    pub config: Config,
    pub metrics: Arc<ReconcileMetrics>,
    /// Cancelled on shutdown; interrupts in-flight provider calls
    pub shutdown: CancellationToken,
}

impl ControllerContext {
    /// Provider clients for one project
    pub fn cloud_for(&self, project: &str) -> Arc<dyn ComputeCloud> {
        Arc::new(GceCloud::new(self.gce.with_project(project)))
    }

    /// Call context for one reconcile
    pub fn call_context(&self) -> CallContext {
        CallContext::with_token(self.shutdown.child_token()).with_timeout(self.config.reconcile_timeout)
    }

    /// API handle for the namespace `obj` lives in
    pub fn namespaced_api<K, R>(&self, obj: &R) -> Result<Api<K>, ReconcileError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
        K::DynamicType: Default,
        R: Resource,
    {
        let namespace = obj
            .meta()
            .namespace
            .as_deref()
            .ok_or(ReconcileError::MissingObjectMetadata("namespace"))?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }
}
