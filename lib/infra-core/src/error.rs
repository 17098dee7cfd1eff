use infra_api::ResourceKey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    /// The resource does not exist. Drives create-vs-update decisions and is
    /// swallowed on delete paths.
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("provider API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("{step}: {source}")]
    Precondition {
        step: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("{verb} is not supported for {kind}")]
    Unsupported {
        kind: &'static str,
        verb: &'static str,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    pub fn not_found(kind: &'static str, key: &ResourceKey) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn precondition(step: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Precondition {
            step,
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Turns a NotFound result into success
pub fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
