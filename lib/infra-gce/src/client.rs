//! Authenticated HTTP access to the Compute Engine v1 REST API

use infra_core::{CallContext, Error, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::operation::Operation;
use crate::rate_limit::OperationRateLimiter;

pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoint: String,
    /// OAuth bearer token; requests go out unauthenticated without one
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Maps a failed response onto the engine error taxonomy
pub(crate) fn classify(status: u16, body: &str, kind: &'static str, key: &str) -> Error {
    if status == 404 {
        return Error::NotFound {
            kind,
            key: key.to_string(),
        };
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    Error::Api {
        code: status,
        message,
    }
}

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

/// What a request is about, for error mapping and logs
#[derive(Clone, Copy, Debug)]
pub(crate) struct Target<'a> {
    pub kind: &'static str,
    pub key: &'a str,
}

#[derive(Clone)]
pub struct GceClient {
    http: reqwest::Client,
    endpoint: String,
    project: String,
    access_token: Option<String>,
    limiter: Arc<OperationRateLimiter>,
}

impl GceClient {
    /// Builds a client with no project; see [`GceClient::with_project`]
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project: String::new(),
            access_token: config.access_token,
            limiter: Arc::new(OperationRateLimiter::default()),
        })
    }

    /// Client for `project` sharing this client's connection pool and limiter
    pub fn with_project(&self, project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..self.clone()
        }
    }

    pub fn with_limiter(mut self, limiter: OperationRateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Absolute URL of a project-relative path
    pub fn url(&self, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoint, self.project, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, ctx: &CallContext, request: RequestBuilder, target: Target<'_>) -> Result<Response> {
        let response = ctx
            .run(async { request.send().await.map_err(transport) })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = ctx
            .run(async { response.text().await.map_err(transport) })
            .await
            .unwrap_or_default();
        let err = classify(status.as_u16(), &body, target.kind, target.key);
        if !err.is_not_found() {
            error!(kind = target.kind, key = target.key, status = status.as_u16(), error = %err, "Compute API request failed");
        }
        Err(err)
    }

    /// Request whose response body is the result itself
    pub(crate) async fn call<B, T>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(ctx, request, target).await?;
        ctx.run(async { response.json::<T>().await.map_err(transport) })
            .await
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
        target: Target<'_>,
    ) -> Result<T> {
        self.call::<(), T>(ctx, Method::GET, url, query, None, target)
            .await
    }

    /// Sends a mutation and waits for the operation it starts to finish
    pub(crate) async fn mutate<B>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request_id = Uuid::new_v4().to_string();
        debug!(kind = target.kind, key = target.key, %method, request_id = %request_id, "Sending mutation");
        let operation: Operation = self
            .call(ctx, method, url, &[("requestId", request_id)], body, target)
            .await?;
        self.wait(ctx, operation, target).await
    }

    async fn wait(&self, ctx: &CallContext, mut operation: Operation, target: Target<'_>) -> Result<()> {
        while !operation.is_done() {
            if operation.self_link.is_empty() {
                return Err(Error::Transport(format!(
                    "operation {} for {} {} has no selfLink",
                    operation.name, target.kind, target.key
                )));
            }
            self.limiter.accept(ctx).await?;

            let link = operation.self_link.clone();
            let name = operation.name.clone();
            debug!(operation = %name, status = %operation.status, "Polling operation");
            operation = self
                .get(ctx, &link, &[], Target { kind: "operation", key: &name })
                .await?;
        }
        operation.into_result()
    }
}
