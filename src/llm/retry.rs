//! Bounded retry around a single fallible call.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{GenerationRequest, LLMResponse, LLM};

/// How the wait between attempts grows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// `base_delay * attempt` before retry number `attempt`
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(10))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, Backoff::Fixed)
    }

    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(max_attempts, base_delay, Backoff::Linear)
    }

    /// A single attempt, no waiting
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after `failed_attempt` (1-based) failed
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay * failed_attempt,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// when every attempt fails.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "⚠️ {} failed on attempt {}/{}: {} (retrying in {:.1}s)",
                        label,
                        attempt,
                        self.max_attempts,
                        e,
                        delay.as_secs_f64()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!("❌ {} exhausted {} attempts: {}", label, self.max_attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

/// One `generate()` call under a retry policy
pub async fn generate_with_retry(
    llm: &dyn LLM,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<LLMResponse> {
    policy.run("generation", |_| llm.generate(request)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_delays_grow() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(20));
    }

    #[test]
    fn test_fixed_delays_stay_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1200));
        assert_eq!(policy.delay_after(1), policy.delay_after(2));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Backoff::Fixed).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let value = policy
            .run("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(anyhow::anyhow!("transient"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_returns_last_error() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let result: Result<()> = policy
            .run("doomed", |attempt| async move { Err(anyhow::anyhow!("failure {}", attempt)) })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "failure 2");
    }

    #[tokio::test]
    async fn test_generate_with_retry_recovers_from_transient_error() {
        let llm = ScriptedLLM::new(vec![Err("503".to_string()), Ok("done".to_string())]);
        let request = GenerationRequest::new("prompt");
        let response = generate_with_retry(&llm, &request, &RetryPolicy::fixed(3, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(llm.call_count(), 2);
    }
}
