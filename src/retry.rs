//! Retry strategies, predicates and the per-call retry state machine.
//!
//! A [`RetryPolicy`] pairs a [`RetryStrategy`] (how many attempts and how
//! long to wait between them) with a [`RetryPredicate`] (which failures are
//! worth another attempt). Each call drives its own [`RetryState`] through
//! [`RetryPolicy::advance`]:
//!
//! ```text
//!            ┌──────── Retry { delay } ────────┐
//!            ▼                                 │
//!        Pending ──success──▶ Succeeded        │
//!            │                                 │
//!            ├──retryable, attempts left───────┘
//!            ├──retryable, none left──▶ ExhaustedRetries
//!            └──not retryable─────────▶ FailedFatal
//! ```

use crate::classify::Outcome;
use crate::transport::RawResponse;
use crate::{Error, ErrorKind};
use http::StatusCode;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Defines how many attempts a call gets and how long to wait between them.
///
/// # Examples
///
/// ```
/// use steadfast::RetryStrategy;
/// use std::time::Duration;
///
/// // A single attempt.
/// let no_retry = RetryStrategy::None;
///
/// // Waits 1s, then 2s: three attempts in total.
/// let exponential = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_secs(1),
///     multiplier: 2.0,
///     max_delay: Duration::from_secs(30),
///     max_attempts: 3,
///     jitter: false,
/// };
/// assert_eq!(exponential.delay_for_attempt(2), Some(Duration::from_secs(2)));
/// assert_eq!(exponential.delay_for_attempt(3), None);
///
/// // Waits 1s between each of four attempts.
/// let linear = RetryStrategy::Linear {
///     delay: Duration::from_secs(1),
///     max_attempts: 4,
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// One attempt, no retries.
    #[default]
    None,

    /// Waits `initial_delay * multiplier^(attempt - 1)` after failed attempt
    /// `attempt`, capped at `max_delay`.
    ExponentialBackoff {
        /// The delay after the first failed attempt.
        initial_delay: Duration,
        /// The factor applied to the delay after each further failure.
        multiplier: f64,
        /// The maximum delay between attempts.
        max_delay: Duration,
        /// The total number of attempts, the first one included.
        max_attempts: usize,
        /// Whether to scale each delay by a random factor in `[0.5, 1.0]`.
        jitter: bool,
    },

    /// Waits a fixed delay between attempts.
    Linear {
        /// The delay between attempts.
        delay: Duration,
        /// The total number of attempts, the first one included.
        max_attempts: usize,
    },

    /// Custom retry logic.
    ///
    /// Takes the number of the attempt that just failed (1-indexed) and
    /// returns the delay before the next one, or `None` to stop.
    Custom {
        /// Function that determines retry delay.
        delay_fn: fn(attempt: usize) -> Option<Duration>,
    },
}

impl RetryStrategy {
    /// The exponential strategy used when nothing else is configured:
    /// three attempts, 1s base delay, doubling, no jitter.
    pub fn standard() -> Self {
        RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
            jitter: false,
        }
    }

    /// Returns the delay after failed attempt `attempt` (1-indexed), or
    /// `None` if no attempt may follow it.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                multiplier,
                max_delay,
                max_attempts,
                jitter,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }

                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let factor = multiplier.max(1.0).powi(exponent);
                let nanos = (initial_delay.as_nanos() as f64 * factor).round();
                let delay = if nanos >= max_delay.as_nanos() as f64 {
                    *max_delay
                } else {
                    Duration::from_nanos(nanos as u64)
                };

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(jitter_factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear {
                delay,
                max_attempts,
            } => {
                if attempt >= *max_attempts {
                    None
                } else {
                    Some(*delay)
                }
            }
            RetryStrategy::Custom { delay_fn } => delay_fn(attempt),
        }
    }

    /// Returns the total number of attempts, if bounded by the strategy.
    pub fn max_attempts(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(1),
            RetryStrategy::ExponentialBackoff { max_attempts, .. } => Some(*max_attempts),
            RetryStrategy::Linear { max_attempts, .. } => Some(*max_attempts),
            RetryStrategy::Custom { .. } => None,
        }
    }
}

/// Decides whether a failed attempt belongs to the retryable set.
///
/// Classified kinds other than [`ErrorKind::HttpError`] are never retried,
/// whatever a predicate returns for them.
///
/// # Examples
///
/// ```
/// use steadfast::{Error, RetryPredicate};
///
/// struct RetryOnBadGateway;
///
/// impl RetryPredicate for RetryOnBadGateway {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         error.status().map_or(false, |s| s.as_u16() == 502)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` if `error`, raised by attempt `attempt` (1-indexed),
    /// should be retried.
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retry all errors that are marked as retryable.
///
/// This uses [`Error::is_retryable`]: transport errors, timeouts and 5xx
/// statuses.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRetryable;

impl RetryPredicate for RetryOnRetryable {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Status { kind, .. } if kind.status().is_server_error())
    }
}

/// Retry only on timeout errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Timeout)
    }
}

/// Retry only on connection-level errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTransportError;

impl RetryPredicate for RetryOnTransportError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Transport(_))
    }
}

/// Retry only on an explicit set of statuses.
///
/// # Examples
///
/// ```
/// use steadfast::retry::RetryOnStatus;
/// use http::StatusCode;
///
/// let predicate = RetryOnStatus::new([StatusCode::SERVICE_UNAVAILABLE]);
/// ```
#[derive(Debug, Clone)]
pub struct RetryOnStatus {
    statuses: Vec<StatusCode>,
}

impl RetryOnStatus {
    /// Creates the predicate from the statuses to retry.
    pub fn new(statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }
}

impl RetryPredicate for RetryOnStatus {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Status { kind, .. } if self.statuses.contains(&kind.status()))
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use steadfast::retry::{RetryOn5xx, RetryOnTimeout, OrPredicate};
///
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOn5xx),
///     Box::new(RetryOnTimeout),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}

/// A retry strategy together with the set of failures it applies to.
///
/// Policies are cheap to clone and can be set on the whole client or on a
/// single call through
/// [`RequestMetadata::with_retry_policy`](crate::metadata::RequestMetadata::with_retry_policy).
///
/// # Examples
///
/// ```
/// use steadfast::retry::{RetryOnStatus, RetryPolicy, RetryStrategy};
/// use http::StatusCode;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(RetryStrategy::Linear {
///     delay: Duration::from_millis(200),
///     max_attempts: 5,
/// })
/// .with_predicate(RetryOnStatus::new([StatusCode::SERVICE_UNAVAILABLE]));
///
/// assert_eq!(policy.strategy().max_attempts(), Some(5));
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    predicate: Arc<dyn RetryPredicate>,
}

impl RetryPolicy {
    /// Creates a policy that retries whatever [`Error::is_retryable`] accepts.
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            predicate: Arc::new(RetryOnRetryable),
        }
    }

    /// A policy with a single attempt.
    pub fn none() -> Self {
        Self::new(RetryStrategy::None)
    }

    /// Exponential backoff without jitter.
    pub fn exponential(max_attempts: usize, base_delay: Duration, multiplier: f64) -> Self {
        Self::new(RetryStrategy::ExponentialBackoff {
            initial_delay: base_delay,
            multiplier,
            max_delay: Duration::MAX,
            max_attempts,
            jitter: false,
        })
    }

    /// Replaces the retryable set.
    pub fn with_predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Replaces the retryable set with a shared predicate.
    pub fn with_shared_predicate(mut self, predicate: Arc<dyn RetryPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub(crate) fn predicate_arc(&self) -> Arc<dyn RetryPredicate> {
        self.predicate.clone()
    }

    /// The strategy of this policy.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Starts the state of a new call.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 1,
            max_attempts: self.strategy.max_attempts(),
            phase: RetryPhase::Pending,
        }
    }

    /// Feeds the outcome of the current attempt into `state` and returns the
    /// next step.
    ///
    /// Terminal steps leave `state` in a terminal phase; further calls
    /// return [`Step::Fatal`] with a configuration error.
    pub fn advance(&self, state: &mut RetryState, outcome: Outcome) -> Step {
        if state.phase != RetryPhase::Pending {
            return Step::Fatal(Error::ConfigurationError(format!(
                "Retry state already finished in {:?}",
                state.phase
            )));
        }

        let error = match outcome {
            Outcome::Success(response) => {
                state.phase = RetryPhase::Succeeded;
                return Step::Succeeded(response);
            }
            Outcome::FatalFailure(error) => {
                state.phase = RetryPhase::FailedFatal;
                return Step::Fatal(error);
            }
            Outcome::ClassifiedError(error) | Outcome::TransientFailure(error) => error,
        };

        // Classified 4xx kinds are final whatever the predicate says.
        let classified_fatal = matches!(
            &error,
            Error::Status { kind, .. } if !matches!(kind, ErrorKind::HttpError(_))
        );
        if classified_fatal || !self.predicate.should_retry(&error, state.attempt) {
            state.phase = RetryPhase::FailedFatal;
            return Step::Fatal(error);
        }

        let within_limit = state.max_attempts.map_or(true, |max| state.attempt < max);
        match self.strategy.delay_for_attempt(state.attempt) {
            Some(delay) if within_limit => {
                state.attempt += 1;
                Step::Retry { delay, error }
            }
            _ if state.attempt == 1 => {
                // Nothing was retried, so the error is surfaced unwrapped.
                state.phase = RetryPhase::ExhaustedRetries;
                Step::Exhausted(error)
            }
            _ => {
                state.phase = RetryPhase::ExhaustedRetries;
                Step::Exhausted(Error::RetriesExhausted {
                    attempts: state.attempt,
                    last_error: Box::new(error),
                })
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Where a call is in its retry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// About to make an attempt.
    Pending,
    /// An attempt succeeded.
    Succeeded,
    /// The last allowed attempt failed with a retryable error.
    ExhaustedRetries,
    /// An attempt failed with an error outside the retryable set.
    FailedFatal,
}

/// The retry bookkeeping of a single call.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: usize,
    max_attempts: Option<usize>,
    phase: RetryPhase,
}

impl RetryState {
    /// The current attempt, starting at 1.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// The attempt limit, if the strategy has one.
    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    /// The current phase.
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }
}

/// What a call does after an attempt.
#[derive(Debug)]
pub enum Step {
    /// Done: return the response.
    Succeeded(RawResponse),
    /// Sleep for `delay`, then make the next attempt.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The error of the attempt that just failed.
        error: Error,
    },
    /// Done: every allowed attempt failed.
    Exhausted(Error),
    /// Done: the failure is not retryable.
    Fatal(Error),
}
