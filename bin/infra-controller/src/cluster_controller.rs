//! GCPCluster controller: network, firewalls and API server load balancer

use chrono::Utc;
use futures::StreamExt;
use infra_api::v1alpha4::{GCPCluster, GCPClusterStatus, NetworkStatus};
use infra_core::{ClusterOutput, ClusterReconciler, ClusterScope};
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent};
use kube_runtime::{watcher, Controller};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::context::ControllerContext;
use crate::error::{cleanup_scope, requeue_after, ReconcileError};

pub const CLUSTER_FINALIZER: &str = "gcpcluster.infrastructure.cluster.x-k8s.io";
const KIND: &str = "gcpcluster";

/// Poll interval while the load balancer has no address yet
const ENDPOINT_PENDING_REQUEUE: Duration = Duration::from_secs(5);
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

pub fn cluster_status(output: &ClusterOutput) -> GCPClusterStatus {
    let endpoint = output.load_balancer.control_plane_endpoint.clone();
    GCPClusterStatus {
        ready: endpoint.is_some(),
        network: NetworkStatus {
            self_link: output.network.self_link.clone(),
            router: output.network.router.clone(),
        },
        failure_domains: output.failure_domains.clone(),
        control_plane_endpoint: endpoint,
        last_update_time: Some(Utc::now().to_rfc3339()),
    }
}

async fn apply(cluster: Arc<GCPCluster>, ctx: &ControllerContext) -> Result<Action, ReconcileError> {
    let scope = ClusterScope::from_cluster(&cluster)?;
    let reconciler = ClusterReconciler::new(ctx.cloud_for(&scope.project));

    let started = Instant::now();
    let result = reconciler.reconcile(&ctx.call_context(), &scope).await;
    ctx.metrics.record(KIND, "reconcile", started, result.is_ok());
    let status = cluster_status(&result?);

    let api: Api<GCPCluster> = ctx.namespaced_api(cluster.as_ref())?;
    api.patch_status(
        &scope.name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;

    if status.ready {
        info!(cluster = %scope.name, endpoint = ?status.control_plane_endpoint, "Cluster infrastructure ready");
        Ok(Action::requeue(RESYNC_INTERVAL))
    } else {
        info!(cluster = %scope.name, "Waiting for control plane endpoint");
        Ok(Action::requeue(ENDPOINT_PENDING_REQUEUE))
    }
}

async fn cleanup(cluster: Arc<GCPCluster>, ctx: &ControllerContext) -> Result<Action, ReconcileError> {
    let scope = cleanup_scope(KIND, &cluster.name_any(), ClusterScope::from_cluster(&cluster))?;
    let Some(scope) = scope else {
        return Ok(Action::await_change());
    };
    let reconciler = ClusterReconciler::new(ctx.cloud_for(&scope.project));

    let started = Instant::now();
    let result = reconciler.delete(&ctx.call_context(), &scope).await;
    ctx.metrics.record(KIND, "delete", started, result.is_ok());
    result?;

    info!(cluster = %scope.name, "Released cluster infrastructure");
    Ok(Action::await_change())
}

pub async fn reconcile(
    cluster: Arc<GCPCluster>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, FinalizerError<ReconcileError>> {
    debug!(cluster = %cluster.name_any(), "Reconciling GCPCluster");
    let api: Api<GCPCluster> = ctx
        .namespaced_api(cluster.as_ref())
        .map_err(FinalizerError::ApplyFailed)?;

    finalizer(&api, CLUSTER_FINALIZER, cluster, |event| async {
        match event {
            FinalizerEvent::Apply(cluster) => apply(cluster, &ctx).await,
            FinalizerEvent::Cleanup(cluster) => cleanup(cluster, &ctx).await,
        }
    })
    .await
}

pub fn error_policy(
    cluster: Arc<GCPCluster>,
    err: &FinalizerError<ReconcileError>,
    _ctx: Arc<ControllerContext>,
) -> Action {
    let delay = requeue_after(err);
    warn!(cluster = %cluster.name_any(), error = %err, requeue_secs = delay.as_secs(), "GCPCluster reconcile failed");
    Action::requeue(delay)
}

pub async fn run(ctx: Arc<ControllerContext>) {
    let clusters: Api<GCPCluster> = match &ctx.config.watch_namespace {
        Some(namespace) => Api::namespaced(ctx.client.clone(), namespace),
        None => Api::all(ctx.client.clone()),
    };
    info!("Starting GCPCluster controller");

    let mut stream = Controller::new(clusters, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .boxed();

    while let Some(item) = stream.next().await {
        match item {
            Ok((object, _)) => debug!(cluster = %object.name, "Reconciled GCPCluster"),
            Err(e) => warn!("GCPCluster controller error: {}", e),
        }
    }
}
