use crate::backends::AnalysisBackend;
use async_trait::async_trait;
use colloquy_core::{ColloquyError, ColloquyResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Retry behaviour for failover across analysis backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per backend before moving to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

/// Whether an error is transient and worth retrying.
///
/// Timeouts, connection failures and the 401, 429 and 5xx statuses are
/// retryable. Other statuses (400, 404) and unusable answers are not.
pub fn is_retryable(err: &ColloquyError) -> bool {
    match err {
        ColloquyError::Timeout(_) => true,
        ColloquyError::Http(msg) => match status_code(msg) {
            Some(code) => code == 401 || code == 429 || (500..600).contains(&code),
            None => true,
        },
        _ => false,
    }
}

fn status_code(msg: &str) -> Option<u16> {
    let (_, rest) = msg.split_once("status ")?;
    rest.get(..3)?.parse().ok()
}

fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// An [`AnalysisBackend`] that wraps several backends and fails over
/// between them, retrying transient errors with exponential backoff.
///
/// Backends are tried in order. Each gets up to `max_retries` retries for
/// retryable errors; a non-retryable error moves on immediately. If every
/// backend fails the last error is returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn AnalysisBackend>>,
    policy: RetryPolicy,
    name: String,
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FailoverBackend {
    /// Fails with [`ColloquyError::Config`] when `backends` is empty.
    pub fn new(
        backends: Vec<Box<dyn AnalysisBackend>>,
        policy: RetryPolicy,
    ) -> ColloquyResult<Self> {
        if backends.is_empty() {
            return Err(ColloquyError::Config(
                "failover requires at least one backend".into(),
            ));
        }
        let name = format!(
            "failover[{}]",
            backends.iter().map(|b| b.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            backends,
            policy,
            name,
            #[cfg(test)]
            sleep_fn: None,
        })
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl AnalysisBackend for FailoverBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> ColloquyResult<String> {
        let mut last_err: Option<ColloquyError> = None;

        for backend in &self.backends {
            for attempt in 0..=self.policy.max_retries {
                match backend.complete(prompt).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if !is_retryable(&e) {
                            warn!(
                                backend = backend.name(),
                                attempt,
                                error = %e,
                                "Non-retryable error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend.name(),
                                attempt,
                                delay_ms = delay,
                                error = %e,
                                "Retryable error, backing off"
                            );
                            self.do_sleep(delay).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ColloquyError::Analysis("all failover backends exhausted".into())))
    }

    async fn is_available(&self) -> bool {
        for backend in &self.backends {
            if backend.is_available().await {
                return true;
            }
        }
        false
    }
}
