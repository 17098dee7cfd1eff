//! Start-up configuration read from the environment

use anyhow::{Context, Result};
use infra_gce::{ClientConfig, DEFAULT_ENDPOINT};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Compute API base URL, overridable for emulators
    pub compute_endpoint: String,
    pub access_token: Option<String>,
    /// Upper bound on one reconcile, provider calls included
    pub reconcile_timeout: Duration,
    pub metrics_addr: SocketAddr,
    /// Restricts both controllers to one namespace; unset watches all
    pub watch_namespace: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reconcile_timeout = match get("RECONCILE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("RECONCILE_TIMEOUT_SECS is not a number: {}", raw))?,
            ),
            None => DEFAULT_RECONCILE_TIMEOUT,
        };

        let metrics_addr = get("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr
            .parse()
            .with_context(|| format!("METRICS_ADDR is not a socket address: {}", metrics_addr))?;

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            compute_endpoint: get("COMPUTE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            access_token: get("GOOGLE_OAUTH_ACCESS_TOKEN"),
            reconcile_timeout,
            metrics_addr,
            watch_namespace: get("WATCH_NAMESPACE"),
            log_format,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.compute_endpoint.clone(),
            access_token: self.access_token.clone(),
            ..Default::default()
        }
    }
}
