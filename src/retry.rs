//! Retry policy for server errors and transport timeouts.
//!
//! The [`Requester`](crate::requester::Requester) consumes a [`RetryPolicy`]:
//! a [`RetryStrategy`] deciding how many times a 5xx answer is retried and how
//! long to wait in between, whether a timed-out exchange is replayed once, and
//! the [`Sleeper`] used to wait. The default policy makes at most four attempts
//! with a linear 50ms × attempt backoff.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Defines how often and after which delay a server error is retried.
///
/// # Examples
///
/// ```
/// use imgur_rest::RetryStrategy;
/// use std::time::Duration;
///
/// // 50ms, 100ms, 150ms, then give up
/// let linear = RetryStrategy::Linear {
///     step: Duration::from_millis(50),
///     max_retries: 3,
/// };
/// assert_eq!(linear.delay_for_attempt(2), Some(Duration::from_millis(100)));
/// assert_eq!(linear.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Do not retry.
    None,

    /// Wait `step * attempt` before each retry.
    Linear {
        /// The delay unit, multiplied by the attempt number.
        step: Duration,
        /// The maximum number of retry attempts.
        max_retries: usize,
    },

    /// Wait the same delay before each retry.
    Fixed {
        /// The delay between retry attempts.
        delay: Duration,
        /// The maximum number of retry attempts.
        max_retries: usize,
    },

    /// Retry with exponentially increasing delays.
    ///
    /// Each retry waits for `initial_delay * 2^(attempt - 1)` (capped at `max_delay`).
    /// Optional jitter adds randomness to prevent thundering herd.
    ExponentialBackoff {
        /// The initial delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// The maximum number of retry attempts.
        max_retries: usize,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },

    /// Custom retry logic.
    ///
    /// Takes the attempt number that just failed (starting from 1) and returns
    /// `Some(delay)` to retry after the delay, or `None` to stop.
    Custom {
        /// Function that determines retry delay.
        delay_fn: fn(attempt: usize) -> Option<Duration>,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Linear {
            step: Duration::from_millis(50),
            max_retries: 3,
        }
    }
}

impl RetryStrategy {
    /// Returns the delay to wait after the given failed attempt, or `None` if
    /// retries are exhausted.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::Linear { step, max_retries } => {
                if attempt > *max_retries {
                    None
                } else {
                    Some(step.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX)))
                }
            }
            RetryStrategy::Fixed { delay, max_retries } => {
                if attempt > *max_retries {
                    None
                } else {
                    Some(*delay)
                }
            }
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if attempt > *max_retries {
                    return None;
                }

                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1) as u32);
                let base_delay =
                    initial_delay.saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));
                let delay = base_delay.min(*max_delay);

                if *jitter {
                    // Random value between 50% and 100% of the delay
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(jitter_factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Custom { delay_fn } => delay_fn(attempt),
        }
    }

    /// Returns the maximum number of retries, if bounded.
    pub fn max_retries(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(0),
            RetryStrategy::Linear { max_retries, .. }
            | RetryStrategy::Fixed { max_retries, .. }
            | RetryStrategy::ExponentialBackoff { max_retries, .. } => Some(*max_retries),
            RetryStrategy::Custom { .. } => None,
        }
    }
}

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over waiting, so backoff can be observed in tests.
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Returns immediately and records every requested delay.
///
/// # Examples
///
/// ```
/// use imgur_rest::retry::{RecordingSleeper, Sleeper};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sleeper = RecordingSleeper::default();
/// sleeper.sleep(Duration::from_millis(50)).await;
/// assert_eq!(sleeper.delays(), vec![Duration::from_millis(50)]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// The delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        Box::pin(std::future::ready(()))
    }
}

/// Everything the requester needs to know about retrying.
#[derive(Clone)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    retry_on_timeout: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    /// Creates a policy with the given server-error strategy, one timeout
    /// retry and the tokio timer.
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            retry_on_timeout: true,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Sets whether a timed-out exchange is replayed once.
    pub fn retry_on_timeout(mut self, enabled: bool) -> Self {
        self.retry_on_timeout = enabled;
        self
    }

    /// Replaces the sleeper used for backoff.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    pub fn retries_timeout(&self) -> bool {
        self.retry_on_timeout
    }

    /// Total attempts per exchange, if bounded.
    pub fn max_attempts(&self) -> Option<usize> {
        self.strategy.max_retries().map(|retries| retries + 1)
    }

    /// Returns the delay after `attempt` failed with a server error, or
    /// `None` if the last response should be surfaced as-is.
    pub fn backoff(&self, attempt: usize) -> Option<Duration> {
        self.strategy.delay_for_attempt(attempt)
    }

    pub(crate) async fn wait(&self, delay: Duration) {
        self.sleeper.sleep(delay).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryStrategy::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .finish_non_exhaustive()
    }
}
