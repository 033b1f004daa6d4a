use crate::{error::RetryError, metrics::Metrics};
use model::execution::pipeline::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait `base_delay` between every attempt.
    Fixed,
    /// Double the delay after each attempt, capped at `max_delay`.
    Exponential { max_delay: Duration },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub backoff: Backoff,
    metrics: Option<Metrics>,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it is clamped to at least one.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: delay,
            backoff: Backoff::Fixed,
            metrics: None,
        }
    }

    pub fn exponential(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Exponential {
                max_delay: if max_delay.is_zero() {
                    base_delay
                } else {
                    max_delay
                },
            },
            metrics: None,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::fixed(settings.attempts, Duration::from_secs(settings.delay_secs))
    }

    /// Preset for opening connections.
    pub fn for_database() -> Self {
        Self::exponential(5, Duration::from_millis(250), Duration::from_secs(5))
    }

    /// Count every retry in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Executes the operation with the configured retry policy.
    ///
    /// Cancellation is only observed while waiting between attempts; an
    /// attempt that is already running is allowed to finish.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: self.max_attempts,
                                source: err,
                            });
                        }

                        let delay = self.delay_for(attempt);
                        warn!(
                            stage = label,
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            ?delay,
                            error = %err,
                            "Stage failed, retrying"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.increment_retries(1);
                        }

                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                            _ = sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                },
            }
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential { max_delay } => {
                if self.base_delay.is_zero() {
                    return Duration::from_millis(0);
                }
                let factor = 1u128 << attempt.min(6);
                let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
                let capped = delay_ms.min(max_delay.as_millis());
                Duration::from_millis(capped as u64)
            }
        }
    }
}
