//! Long-running operations returned by every Compute Engine mutation

use infra_core::{Error, Result};
use serde::Deserialize;

pub const STATUS_DONE: &str = "DONE";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: String,

    /// PENDING, RUNNING or DONE
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub target_link: String,

    #[serde(default)]
    pub self_link: String,

    #[serde(default)]
    pub error: Option<OperationError>,

    #[serde(default)]
    pub http_error_status_code: Option<u16>,

    #[serde(default)]
    pub http_error_message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == STATUS_DONE
    }

    /// Outcome of a finished operation
    pub fn into_result(self) -> Result<()> {
        let errors = match self.error {
            Some(error) if !error.errors.is_empty() => error.errors,
            _ => return Ok(()),
        };

        let message = errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::Api {
            code: self.http_error_status_code.unwrap_or(500),
            message: format!("operation {} failed: {}", self.name, message),
        })
    }
}
