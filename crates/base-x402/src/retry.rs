//! Bounded retry with injectable delays.
//!
//! Chain reads and facilitator calls both retry through a [`RetryPolicy`].
//! The policy never loops unbounded, and its [`Sleeper`] can be swapped for a
//! recording fake so retry behaviour is testable without real waiting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Suspends the current task. Production code uses [`TokioSleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay between every attempt.
    Fixed,
    /// `base_delay * 2^n` after the n-th failed attempt (0-based).
    Exponential,
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished, successfully or not. No further attempts are made.
    Done(Result<T, E>),
    /// Transient failure. Retried while attempts remain.
    Retry(E),
}

#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound of a uniformly random extra delay. Zero disables jitter.
    pub jitter: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
            jitter: Duration::ZERO,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Chain reads: 3 attempts, 1.5s apart. Covers tx propagation lag.
    pub fn chain_reads() -> Self {
        Self::new(3, Duration::from_millis(1500), Backoff::Fixed)
    }

    /// Remote facilitator calls: one try plus two retries, 200ms doubling.
    pub fn facilitator() -> Self {
        Self::new(3, Duration::from_millis(200), Backoff::Exponential)
    }

    /// No waiting, single attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Backoff::Fixed)
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Delay before the attempt following failed attempt `failed` (0-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => self.base_delay.saturating_mul(1u32 << failed.min(16)),
        };
        if self.jitter.is_zero() {
            return base;
        }
        let max = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        base + Duration::from_millis(rand::rng().random_range(0..=max))
    }

    /// Run `op` until it reports [`Attempt::Done`] or the attempt budget is
    /// spent. `op` receives the 0-based attempt number. The last transient
    /// error is returned when every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(err) => {
                    if attempt + 1 >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
