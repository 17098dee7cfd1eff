//! Cancellation and deadline threaded through every provider call

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Per-reconcile call context. Cloning shares the cancellation token.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Context bound to an existing cancellation token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Returns a copy that expires after `timeout`, keeping an earlier
    /// deadline if one is already set
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(match self.deadline {
                Some(existing) if existing < deadline => existing,
                _ => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast if the context is already cancelled or expired
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Runs `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever comes first
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(Error::DeadlineExceeded),
                result = fut => result,
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::Cancelled),
                result = fut => result,
            },
        }
    }

    /// Sleeps for `duration` unless interrupted
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
