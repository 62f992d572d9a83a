//! Retry and delay policy for propagation checks.

use std::time::Duration;

/// How many times a single authority may be re-checked after a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    /// At most this many retries (so `n + 1` checks in total).
    Limited(u32),
    /// Retry forever; only external cancellation ends a failing run.
    Unlimited,
}

impl RetryLimit {
    /// Map a configured retry count, where any negative value means unlimited.
    #[must_use]
    pub fn from_config(retry: i64) -> Self {
        if retry < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(retry).unwrap_or(u32::MAX))
        }
    }

    /// Whether an authority that already used `attempts` retries may try again.
    #[must_use]
    pub const fn allows(self, attempts: u32) -> bool {
        match self {
            Self::Limited(max) => attempts < max,
            Self::Unlimited => true,
        }
    }
}

impl std::fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{max}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// What the waiter does once an authority runs out of retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Abort the whole run on the first exhausted authority.
    #[default]
    FailFast,
    /// Keep checking the rest of the worklist and report every failure.
    CheckAll,
}

/// Extra delay terms for the backoff-capable policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Add `base * 2^attempt` to each delay.
    pub exponential: bool,

    /// Multiplier for the exponential term.
    pub base: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            exponential: true,
            base: Duration::from_secs(5),
            max_delay: None,
        }
    }
}

/// Immutable policy for one propagation wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationPolicy {
    /// Delay applied before every re-check.
    pub base_delay: Duration,

    /// Retry budget per authority address.
    pub retry_limit: RetryLimit,

    /// `None` keeps the fixed delay; `Some` adds jitter, backoff and cap.
    pub backoff: Option<BackoffPolicy>,

    /// Behavior when an authority is exhausted.
    pub failure_mode: FailureMode,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponent ceiling; `2^32` already saturates any realistic delay.
const MAX_EXPONENT: u32 = 32;

impl PropagationPolicy {
    /// Fixed 60s delay, six retries, fail-fast.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            retry_limit: RetryLimit::Limited(6),
            backoff: None,
            failure_mode: FailureMode::FailFast,
        }
    }

    /// Set the base delay
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the retry limit
    #[must_use]
    pub const fn retry_limit(mut self, limit: RetryLimit) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Switch to the backoff-capable delay computation
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Set the failure mode
    #[must_use]
    pub const fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Whether delays include random jitter.
    #[must_use]
    pub const fn uses_jitter(&self) -> bool {
        self.backoff.is_some()
    }

    /// Delay before re-checking an authority that already used `attempt` retries.
    ///
    /// `jitter` is a fraction of a second in `[0, 1)`; it is ignored by the
    /// fixed policy and clamped into range otherwise.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let Some(backoff) = &self.backoff else {
            return self.base_delay;
        };

        let jitter = if jitter.is_finite() {
            Duration::from_secs_f64(jitter.clamp(0.0, 0.999_999))
        } else {
            Duration::ZERO
        };
        let mut delay = self.base_delay.saturating_add(jitter);

        if backoff.exponential {
            let factor = 2u32.saturating_pow(attempt.min(MAX_EXPONENT));
            delay = delay.saturating_add(backoff.base.saturating_mul(factor));
        }

        match backoff.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}
