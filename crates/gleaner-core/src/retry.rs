//! Bounded exponential-backoff retry around fetch operations.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;
use crate::error::AppError;

/// Which failures the executor keeps retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Retry every error identically (the historical behavior).
    #[default]
    All,
    /// Stop early on errors [`AppError::is_retryable`] calls terminal.
    TransientOnly,
}

/// Runs an operation up to `max_attempts` times with `base_delay × 2^attempt`
/// backoff between failures.
///
/// The final failure is wrapped as [`AppError::FetchExhausted`] carrying the
/// last underlying error. Backoff sleeps observe the job's cancellation
/// token; cancellation surfaces as [`AppError::Cancelled`].
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    base_delay: Duration,
    mode: RetryMode,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(policy: &RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(policy.base_delay_secs.max(0.0)),
            mode: RetryMode::default(),
            cancel,
        }
    }

    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op`, retrying on failure until success or attempts run out.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut last_error: Option<AppError> = None;

        for attempt in 0..self.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let terminal =
                        self.mode == RetryMode::TransientOnly && !e.is_retryable();
                    let attempts_left = attempt + 1 < self.max_attempts;

                    if attempts_left && !terminal {
                        let delay = self.base_delay * 2u32.saturating_pow(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_ms = %delay.as_millis(),
                            error = %e,
                            "Attempt failed, retrying"
                        );
                        last_error = Some(e);
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = self.cancel.cancelled() => return Err(AppError::Cancelled),
                        }
                    } else {
                        if terminal {
                            tracing::warn!(error = %e, "Terminal error, not retrying");
                        } else {
                            tracing::error!(
                                attempts = self.max_attempts,
                                error = %e,
                                "All attempts failed"
                            );
                        }
                        return Err(AppError::FetchExhausted {
                            attempts: attempt + 1,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }

        // Unreachable with max_attempts >= 1; keep the compiler honest.
        Err(AppError::FetchExhausted {
            attempts: self.max_attempts,
            source: Box::new(last_error.unwrap_or(AppError::Generic("no attempts ran".into()))),
        })
    }
}
