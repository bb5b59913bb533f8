//! Deadlines for blocking collaborator calls
//!
//! Registry round-trips and resolver subprocesses are the suspension points
//! of a build. Each of them takes a `Deadline` from its caller and fails with
//! `LaminaError::Timeout` once it elapses. Dropping the wrapped future is the
//! cancellation mechanism, so subprocesses must be spawned with
//! `kill_on_drop(true)`.

use crate::error::{LaminaError, LaminaResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Absolute point in time after which a call is abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never elapses
    pub fn none() -> Self {
        Self { at: None }
    }

    /// A deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// Time left before the deadline (`None` when unbounded)
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Run `fut` bounded by this deadline.
    ///
    /// The operation name ends up in the timeout error so the caller can tell
    /// which collaborator stalled.
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> LaminaResult<T>
    where
        F: Future<Output = LaminaResult<T>>,
    {
        match self.at {
            None => fut.await,
            Some(at) => match tokio::time::timeout_at(at, fut).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Deadline elapsed during {}", operation);
                    Err(LaminaError::Timeout {
                        operation: operation.to_string(),
                    })
                }
            },
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
