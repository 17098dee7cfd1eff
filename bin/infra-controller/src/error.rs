use kube_runtime::finalizer::Error as FinalizerError;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Retry delay for provider and API server failures
pub const TRANSIENT_REQUEUE: Duration = Duration::from_secs(30);
/// Retry delay for objects that cannot succeed until someone edits them
pub const INVALID_SPEC_REQUEUE: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("infrastructure error: {0}")]
    Engine(#[from] infra_core::Error),

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("object has no {0}")]
    MissingObjectMetadata(&'static str),
}

impl ReconcileError {
    pub fn requeue_after(&self) -> Duration {
        match self {
            ReconcileError::Engine(infra_core::Error::InvalidSpec(_)) => INVALID_SPEC_REQUEUE,
            _ => TRANSIENT_REQUEUE,
        }
    }
}

/// Delay before retrying an object whose reconcile failed
pub fn requeue_after(err: &FinalizerError<ReconcileError>) -> Duration {
    match err {
        FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e.requeue_after(),
        _ => TRANSIENT_REQUEUE,
    }
}

/// Scope for a teardown. A spec that never validated cannot have produced
/// provider resources, so `None` tells the caller to release the object.
pub fn cleanup_scope<T>(
    kind: &str,
    name: &str,
    scope: infra_core::Result<T>,
) -> Result<Option<T>, ReconcileError> {
    match scope {
        Ok(scope) => Ok(Some(scope)),
        Err(infra_core::Error::InvalidSpec(reason)) => {
            warn!(kind, name, reason = %reason, "Invalid spec, releasing without provider cleanup");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
