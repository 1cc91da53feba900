//! Bounded, fixed-interval retry of search execution.
//!
//! A search is attempted up to `max_attempts` times. Transient failures wait
//! for `backoff` and try again; anything else fails at once. Waiting goes
//! through a [`Sleeper`] so tests can observe backoff without real delays,
//! and races a [`CancelToken`] so a cancelled caller is not kept waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::connection::SearchConnection;
use crate::error::{ConfigError, ExtractError, ExtractResult, TransportError};
use crate::query::SearchRequest;

/// Suspends the current task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Cooperative cancellation signal shared between a caller and its fetches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every operation observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not lost.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// How often and how patiently a search is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is validated when a search runs.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Reads the policy from a connection's retry settings.
    pub fn from_connection<C: SearchConnection + ?Sized>(connection: &C) -> Self {
        Self::new(
            connection.max_connection_attempts(),
            connection.connection_retry_backoff(),
        )
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait between two attempts.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Rejects policies that would never attempt anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts {
                attempts: self.max_attempts,
            });
        }
        Ok(())
    }
}

/// Executes one search request with retry.
pub struct PageFetcher<'a, C: ?Sized> {
    connection: &'a C,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    cancel: &'a CancelToken,
}

impl<'a, C> PageFetcher<'a, C>
where
    C: SearchConnection + ?Sized,
{
    /// Creates a fetcher over a connection.
    pub fn new(
        connection: &'a C,
        policy: RetryPolicy,
        sleeper: &'a dyn Sleeper,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            connection,
            policy,
            sleeper,
            cancel,
        }
    }

    /// Runs the search, retrying transient failures.
    ///
    /// Returns the raw response of the first successful attempt.
    pub async fn execute(&self, request: &SearchRequest) -> ExtractResult<Value> {
        self.policy.validate()?;

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            attempt += 1;

            let error = match self.connection.search(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => return Err(ExtractError::Backend(e)),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                tracing::error!(
                    index = %request.index,
                    attempts = attempt,
                    error = %error,
                    "Search failed, retries exhausted"
                );
                return Err(TransportError::Exhausted {
                    attempts: attempt,
                    last: error,
                }
                .into());
            }

            tracing::warn!(
                index = %request.index,
                attempt,
                max_attempts,
                backoff_ms = self.policy.backoff().as_millis() as u64,
                error = %error,
                "Search attempt failed, retrying"
            );

            tokio::select! {
                _ = self.sleeper.sleep(self.policy.backoff()) => {}
                _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
            }
        }
    }
}
