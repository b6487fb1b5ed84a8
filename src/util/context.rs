use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::model::error::{ConnectorError, Result};

/// Cancellation and deadline shared by every call of one invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline counted from now. A timeout too large to represent as an
    /// instant leaves the context without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ConnectorError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` until it finishes, the token is cancelled or the deadline
    /// passes, whichever comes first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ConnectorError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(ConnectorError::DeadlineExceeded),
                out = fut => Ok(out),
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ConnectorError::Cancelled),
                out = fut => Ok(out),
            },
        }
    }
}
