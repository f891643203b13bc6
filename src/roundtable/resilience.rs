//! Retry and pacing policies applied at the completion-service boundary.
//!
//! The reference behaviour is deliberately simple: a failed call is not retried (the
//! discussion loop waits a fixed interval and substitutes a placeholder utterance) and every
//! round is followed by a fixed pause. Both are the defaults here. [`RetryPolicy`] adds
//! exponential backoff with deterministic jitter, and [`PacingPolicy::TokenBucket`] replaces
//! the unconditional pause with a bucket that only waits when calls arrive faster than the
//! configured rate.
//!
//! ```rust
//! use roundtable::resilience::{PacingPolicy, RetryPolicy};
//! use std::time::Duration;
//!
//! let retry = RetryPolicy::exponential(3, Duration::from_millis(200), Duration::from_secs(2));
//! assert_eq!(retry.backoff_for(0), Duration::from_millis(200));
//!
//! let pacing = PacingPolicy::default();
//! assert_eq!(pacing, PacingPolicy::FixedDelay(Duration::from_secs(2)));
//! ```
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::roundtable::client_wrapper::{
    ClientError, ClientWrapper, Completion, CompletionRequest,
};

/// Configuration for retry and backoff behaviour.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first one.
    pub max_attempts: usize,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single backoff delay.
    pub max_delay: Duration,
    /// Shave a deterministic amount off each delay so parallel runs spread out.
    pub jitter: bool,
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            jitter: false,
        }
    }

    pub fn exponential(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: true,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay to wait after the failed attempt with the given zero-based index.
    pub fn backoff_for(&self, attempt_index: usize) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        let mut delay = base.saturating_mul(1u64 << attempt_index.min(16)).min(cap);
        if self.jitter && attempt_index > 0 {
            let span = (delay / 2).max(1);
            let jitter = (attempt_index as u64)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1)
                % span;
            delay = delay.saturating_sub(jitter);
        }
        Duration::from_millis(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Wraps another client and retries transient failures with exponential backoff.
pub struct ResilientClient {
    inner: Arc<dyn ClientWrapper>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(inner: Arc<dyn ClientWrapper>, policy: RetryPolicy) -> Self {
        ResilientClient { inner, policy }
    }
}

#[async_trait]
impl ClientWrapper for ResilientClient {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.complete(request).await {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    attempt += 1;
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt >= self.policy.max_attempts {
                        if attempt == 1 {
                            return Err(err);
                        }
                        return Err(ClientError::RetryExceeded {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self.policy.backoff_for(attempt - 1);
                    log::warn!(
                        "attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        err,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// How the discussion loop spaces out calls to the completion service.
#[derive(Clone, Debug, PartialEq)]
pub enum PacingPolicy {
    /// Never wait.
    None,
    /// Sleep this long after every round, regardless of how long the call took.
    FixedDelay(Duration),
    /// Allow bursts of `capacity` calls, refilling one permit every `refill_every`.
    TokenBucket {
        capacity: u32,
        refill_every: Duration,
    },
}

impl Default for PacingPolicy {
    fn default() -> Self {
        PacingPolicy::FixedDelay(Duration::from_secs(2))
    }
}

/// Runtime state for a [`PacingPolicy`]. Owned by a single discussion run.
pub struct Pacer {
    policy: PacingPolicy,
    tokens: f64,
    last_refill: Instant,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        let tokens = match &policy {
            PacingPolicy::TokenBucket { capacity, .. } => f64::from(*capacity),
            _ => 0.0,
        };
        Pacer {
            policy,
            tokens,
            last_refill: Instant::now(),
        }
    }

    /// Wait (if needed) before issuing a call.
    pub async fn before_call(&mut self) {
        if let Some(wait) = self.acquire(Instant::now()) {
            log::debug!("pacing: waiting {:?} for a call permit", wait);
            sleep(wait).await;
        }
    }

    /// Wait (if needed) after a round has been recorded.
    pub async fn after_round(&self) {
        if let PacingPolicy::FixedDelay(delay) = &self.policy {
            if *delay > Duration::from_millis(0) {
                sleep(*delay).await;
            }
        }
    }

    /// Take a permit from the bucket at `now`, returning how long the caller must wait.
    fn acquire(&mut self, now: Instant) -> Option<Duration> {
        let (capacity, refill_every) = match &self.policy {
            PacingPolicy::TokenBucket {
                capacity,
                refill_every,
            } => (f64::from((*capacity).max(1)), *refill_every),
            _ => return None,
        };
        if refill_every.as_secs_f64() <= 0.0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() / refill_every.as_secs_f64())
            .min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(missing * refill_every.as_secs_f64());
            self.tokens = 0.0;
            self.last_refill = now + wait;
            Some(wait)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(350))
            .with_jitter(false);
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_never_exceeds_unjittered_delay() {
        let plain = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(5))
            .with_jitter(false);
        let jittered = plain.clone().with_jitter(true);
        for attempt in 0..6 {
            assert!(jittered.backoff_for(attempt) <= plain.backoff_for(attempt));
            assert!(jittered.backoff_for(attempt) >= plain.backoff_for(attempt) / 2);
        }
    }

    #[test]
    fn test_token_bucket_allows_burst_then_waits() {
        let mut pacer = Pacer::new(PacingPolicy::TokenBucket {
            capacity: 2,
            refill_every: Duration::from_secs(1),
        });
        let now = pacer.last_refill;
        assert_eq!(pacer.acquire(now), None);
        assert_eq!(pacer.acquire(now), None);
        let wait = pacer.acquire(now).unwrap();
        assert_eq!(wait, Duration::from_secs(1));
    }

    #[test]
    fn test_fixed_delay_never_blocks_before_call() {
        let mut pacer = Pacer::new(PacingPolicy::default());
        let now = Instant::now();
        assert_eq!(pacer.acquire(now), None);
    }
}
