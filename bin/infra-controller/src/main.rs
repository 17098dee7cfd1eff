use anyhow::Result;
use infra_api::{GCPCluster, GCPMachine};
use infra_gce::GceClient;
use kube::{Client, CustomResourceExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod cluster_controller;
mod config;
mod context;
mod error;
mod machine_controller;
mod metrics;

use config::{Config, LogFormat};
use context::ControllerContext;
use metrics::ReconcileMetrics;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // `infra-controller crds` prints the CustomResourceDefinitions and exits
    if std::env::args().nth(1).as_deref() == Some("crds") {
        println!("{}", serde_json::to_string_pretty(&GCPCluster::crd())?);
        println!("{}", serde_json::to_string_pretty(&GCPMachine::crd())?);
        return Ok(());
    }

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    info!("Starting infra-controller...");
    info!("  - Compute endpoint: {}", config.compute_endpoint);
    info!("  - Reconcile timeout: {:?}", config.reconcile_timeout);
    info!(
        "  - Namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    let client = Client::try_default().await?;
    let gce = GceClient::new(config.client_config())?;
    let metrics = Arc::new(ReconcileMetrics::new()?);
    let shutdown = CancellationToken::new();

    let ctx = Arc::new(ControllerContext {
        client,
        gce,
        config: config.clone(),
        metrics: metrics.clone(),
        shutdown: shutdown.clone(),
    });

    tokio::spawn(async move {
        if let Err(e) = metrics::serve(config.metrics_addr, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });
    tokio::spawn(cluster_controller::run(ctx.clone()));
    tokio::spawn(machine_controller::run(ctx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, cancelling in-flight reconciles...");
    shutdown.cancel();

    Ok(())
}
