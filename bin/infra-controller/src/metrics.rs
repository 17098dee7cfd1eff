//! Prometheus metrics for reconciles and the HTTP endpoint that serves them

use anyhow::Result;
use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::tokio::TokioIo;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Reconcile counters and latencies labelled by object kind and operation
pub struct ReconcileMetrics {
    pub reconciles_total: CounterVec,
    pub reconcile_errors_total: CounterVec,
    pub reconcile_duration_seconds: HistogramVec,
    registry: Registry,
}

impl ReconcileMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconciles_total = CounterVec::new(
            Opts::new("infra_reconciles_total", "Total reconciles"),
            &["kind", "operation"],
        )?;

        let reconcile_errors_total = CounterVec::new(
            Opts::new("infra_reconcile_errors_total", "Reconciles that returned an error"),
            &["kind", "operation"],
        )?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "infra_reconcile_duration_seconds",
                "Reconcile latency in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            &["kind", "operation"],
        )?;

        registry.register(Box::new(reconciles_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        Ok(Self {
            reconciles_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            registry,
        })
    }

    pub fn record(&self, kind: &str, operation: &str, started: Instant, succeeded: bool) {
        let labels = [kind, operation];
        self.reconciles_total.with_label_values(&labels).inc();
        if !succeeded {
            self.reconcile_errors_total.with_label_values(&labels).inc();
        }
        self.reconcile_duration_seconds
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());
    }

    /// All metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn text(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn route(method: &Method, path: &str, metrics: &ReconcileMetrics) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => match metrics.gather() {
            Ok(body) => text(StatusCode::OK, "text/plain; version=0.0.4", body),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "metrics unavailable\n")
            }
        },
        (&Method::GET, "/healthz") => text(StatusCode::OK, "text/plain", "OK\n"),
        _ => text(StatusCode::NOT_FOUND, "text/plain", "not found\n"),
    }
}

async fn handle(req: Request<Incoming>, metrics: Arc<ReconcileMetrics>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &metrics))
}

/// Serves `/metrics` and `/healthz` until the task is dropped
pub async fn serve(addr: SocketAddr, metrics: Arc<ReconcileMetrics>) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle(req, metrics.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Metrics connection from {} closed: {}", peer_addr, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_gather() {
        let metrics = ReconcileMetrics::new().unwrap();
        metrics.record("gcpcluster", "reconcile", Instant::now(), true);
        metrics.record("gcpcluster", "reconcile", Instant::now(), false);

        assert_eq!(
            metrics
                .reconciles_total
                .with_label_values(&["gcpcluster", "reconcile"])
                .get(),
            2.0
        );
        assert_eq!(
            metrics
                .reconcile_errors_total
                .with_label_values(&["gcpcluster", "reconcile"])
                .get(),
            1.0
        );

        let body = metrics.gather().unwrap();
        assert!(body.contains("infra_reconciles_total{kind=\"gcpcluster\",operation=\"reconcile\"} 2"));
        assert!(body.contains("infra_reconcile_duration_seconds_bucket"));
    }

    #[test]
    fn test_routes() {
        let metrics = ReconcileMetrics::new().unwrap();

        let health = route(&Method::GET, "/healthz", &metrics);
        assert_eq!(health.status(), StatusCode::OK);

        let scrape = route(&Method::GET, "/metrics", &metrics);
        assert_eq!(scrape.status(), StatusCode::OK);
        assert_eq!(
            scrape.headers()[CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );

        assert_eq!(route(&Method::GET, "/", &metrics).status(), StatusCode::NOT_FOUND);
        assert_eq!(route(&Method::POST, "/metrics", &metrics).status(), StatusCode::NOT_FOUND);
    }
}
