//! Bootstrap payload read from the Secret a machine references

use async_trait::async_trait;
use infra_core::{BootstrapDataSource, CallContext, Error, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::Api;

/// Key of the payload inside the bootstrap Secret
pub const BOOTSTRAP_DATA_KEY: &str = "value";

pub struct SecretBootstrapData {
    secrets: Api<Secret>,
    secret_name: Option<String>,
}

impl SecretBootstrapData {
    pub fn new(secrets: Api<Secret>, secret_name: Option<String>) -> Self {
        Self {
            secrets,
            secret_name,
        }
    }
}

fn decode(secret: Secret, name: &str) -> Result<String> {
    let payload = secret
        .data
        .and_then(|mut data| data.remove(BOOTSTRAP_DATA_KEY))
        .ok_or_else(|| {
            Error::InvalidSpec(format!(
                "bootstrap secret {} has no {} key",
                name, BOOTSTRAP_DATA_KEY
            ))
        })?;
    String::from_utf8(payload.0).map_err(|e| Error::precondition("bootstrap data is not UTF-8", e))
}

#[async_trait]
impl BootstrapDataSource for SecretBootstrapData {
    async fn bootstrap_data(&self, ctx: &CallContext) -> Result<String> {
        let name = self
            .secret_name
            .as_deref()
            .ok_or_else(|| Error::InvalidSpec("bootstrap.dataSecretName is not set".to_string()))?;

        let secret = ctx
            .run(async {
                self.secrets
                    .get(name)
                    .await
                    .map_err(|e| Error::precondition("failed to read bootstrap secret", e))
            })
            .await?;
        decode(secret, name)
    }
}
