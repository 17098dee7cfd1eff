//! GCPMachine controller: one compute instance plus its load balancer membership

use chrono::Utc;
use futures::StreamExt;
use infra_api::v1alpha4::{GCPCluster, GCPMachine, GCPMachineStatus};
use infra_core::{MachineOutput, MachineReconciler, MachineScope};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent};
use kube_runtime::{watcher, Controller};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bootstrap::SecretBootstrapData;
use crate::context::ControllerContext;
use crate::error::{cleanup_scope, requeue_after, ReconcileError};

pub const MACHINE_FINALIZER: &str = "gcpmachine.infrastructure.cluster.x-k8s.io";
const KIND: &str = "gcpmachine";

/// Poll interval while the cluster or the instance is still coming up
const PENDING_REQUEUE: Duration = Duration::from_secs(10);
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

pub fn machine_status(output: &MachineOutput) -> GCPMachineStatus {
    GCPMachineStatus {
        ready: output.is_running(),
        provider_id: Some(output.provider_id.clone()),
        addresses: output.addresses.clone(),
        instance_status: output.instance_status.map(|s| s.as_str().to_string()),
        last_update_time: Some(Utc::now().to_rfc3339()),
    }
}

/// The owning cluster, if it exists and has finished its own reconcile
async fn ready_cluster(
    machine: &GCPMachine,
    ctx: &ControllerContext,
) -> Result<Option<GCPCluster>, ReconcileError> {
    let clusters: Api<GCPCluster> = ctx.namespaced_api(machine)?;
    let cluster = clusters.get_opt(&machine.spec.cluster_name).await?;
    Ok(cluster.filter(|c| c.status.as_ref().map(|s| s.ready).unwrap_or(false)))
}

async fn apply(machine: Arc<GCPMachine>, ctx: &ControllerContext) -> Result<Action, ReconcileError> {
    let cluster = match ready_cluster(&machine, ctx).await? {
        Some(cluster) => cluster,
        None => {
            info!(machine = %machine.name_any(), cluster = %machine.spec.cluster_name, "Waiting for cluster infrastructure");
            return Ok(Action::requeue(PENDING_REQUEUE));
        }
    };

    let scope = MachineScope::from_machine(&machine, &cluster)?;
    let reconciler = MachineReconciler::new(ctx.cloud_for(&scope.project));
    let bootstrap = SecretBootstrapData::new(
        ctx.namespaced_api::<Secret, _>(machine.as_ref())?,
        machine.spec.bootstrap.data_secret_name.clone(),
    );

    let started = Instant::now();
    let result = reconciler
        .reconcile(&ctx.call_context(), &scope, &bootstrap)
        .await;
    ctx.metrics.record(KIND, "reconcile", started, result.is_ok());
    let status = machine_status(&result?);

    let api: Api<GCPMachine> = ctx.namespaced_api(machine.as_ref())?;
    api.patch_status(
        &scope.name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;

    if status.ready {
        Ok(Action::requeue(RESYNC_INTERVAL))
    } else {
        info!(machine = %scope.name, state = ?status.instance_status, "Waiting for instance to run");
        Ok(Action::requeue(PENDING_REQUEUE))
    }
}

async fn cleanup(machine: Arc<GCPMachine>, ctx: &ControllerContext) -> Result<Action, ReconcileError> {
    let clusters: Api<GCPCluster> = ctx.namespaced_api(machine.as_ref())?;
    let Some(cluster) = clusters.get_opt(&machine.spec.cluster_name).await? else {
        warn!(machine = %machine.name_any(), cluster = %machine.spec.cluster_name, "Cluster is gone, releasing machine without provider cleanup");
        return Ok(Action::await_change());
    };

    let scope = cleanup_scope(KIND, &machine.name_any(), MachineScope::from_machine(&machine, &cluster))?;
    let Some(scope) = scope else {
        return Ok(Action::await_change());
    };
    let reconciler = MachineReconciler::new(ctx.cloud_for(&scope.project));

    let started = Instant::now();
    let result = reconciler.delete(&ctx.call_context(), &scope).await;
    ctx.metrics.record(KIND, "delete", started, result.is_ok());
    result?;

    info!(machine = %scope.name, "Released machine");
    Ok(Action::await_change())
}

pub async fn reconcile(
    machine: Arc<GCPMachine>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, FinalizerError<ReconcileError>> {
    debug!(machine = %machine.name_any(), "Reconciling GCPMachine");
    let api: Api<GCPMachine> = ctx
        .namespaced_api(machine.as_ref())
        .map_err(FinalizerError::ApplyFailed)?;

    finalizer(&api, MACHINE_FINALIZER, machine, |event| async {
        match event {
            FinalizerEvent::Apply(machine) => apply(machine, &ctx).await,
            FinalizerEvent::Cleanup(machine) => cleanup(machine, &ctx).await,
        }
    })
    .await
}

pub fn error_policy(
    machine: Arc<GCPMachine>,
    err: &FinalizerError<ReconcileError>,
    _ctx: Arc<ControllerContext>,
) -> Action {
    let delay = requeue_after(err);
    warn!(machine = %machine.name_any(), error = %err, requeue_secs = delay.as_secs(), "GCPMachine reconcile failed");
    Action::requeue(delay)
}

pub async fn run(ctx: Arc<ControllerContext>) {
    let machines: Api<GCPMachine> = match &ctx.config.watch_namespace {
        Some(namespace) => Api::namespaced(ctx.client.clone(), namespace),
        None => Api::all(ctx.client.clone()),
    };
    info!("Starting GCPMachine controller");

    let mut stream = Controller::new(machines, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .boxed();

    while let Some(item) = stream.next().await {
        match item {
            Ok((object, _)) => debug!(machine = %object.name, "Reconciled GCPMachine"),
            Err(e) => warn!("GCPMachine controller error: {}", e),
        }
    }
}
