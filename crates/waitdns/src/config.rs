//! Propagation settings, loaded from TOML.
//!
//! Keys match the authenticator option names:
//!
//! ```toml
//! propagation-seconds = 30
//! propagation-retry = -1          # negative: retry forever
//! exponential-backoff-retry = true
//! exponential-backoff-seconds = 5
//! max-delay-time = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::WaitDnsError;
use crate::policy::{BackoffPolicy, FailureMode, PropagationPolicy, RetryLimit};
use crate::query::DNS_PORT;

/// Settings for one propagation wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WaitConfig {
    /// Base delay between checks of one authority (seconds).
    #[serde(default = "default_propagation_seconds")]
    pub propagation_seconds: u64,

    /// Retries per authority address; negative means unlimited.
    #[serde(default = "default_propagation_retry")]
    pub propagation_retry: i64,

    /// Add `exponential-backoff-seconds * 2^attempt` to each delay.
    #[serde(default)]
    pub exponential_backoff_retry: bool,

    /// Base of the exponential term (seconds).
    #[serde(default = "default_backoff_seconds")]
    pub exponential_backoff_seconds: u64,

    /// Upper bound for a single delay (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_time: Option<u64>,

    /// Bound on one direct query (seconds).
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Port the authorities answer on.
    #[serde(default = "default_dns_port")]
    pub dns_port: u16,

    /// Also check name server AAAA addresses.
    #[serde(default)]
    pub ipv6: bool,

    /// Keep checking after the first exhausted authority and report all of them.
    #[serde(default)]
    pub check_all: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            propagation_seconds: default_propagation_seconds(),
            propagation_retry: default_propagation_retry(),
            exponential_backoff_retry: false,
            exponential_backoff_seconds: default_backoff_seconds(),
            max_delay_time: None,
            query_timeout: default_query_timeout(),
            dns_port: default_dns_port(),
            ipv6: false,
            check_all: false,
        }
    }
}

impl WaitConfig {
    /// Load config from a TOML file, falling back to defaults.
    ///
    /// Only for implicit locations; a path the user named goes through
    /// [`Self::read`].
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a TOML file that must exist.
    pub fn read(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WaitDnsError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| WaitDnsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot produce a working wait.
    pub fn validate(&self) -> crate::Result<()> {
        if self.query_timeout == 0 {
            return Err(WaitDnsError::Config(
                "query-timeout must be at least 1 second".into(),
            ));
        }
        if self.dns_port == 0 {
            return Err(WaitDnsError::Config("dns-port must not be 0".into()));
        }
        Ok(())
    }

    /// Bound on one direct query.
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Whether the backoff-capable delay computation applies.
    ///
    /// Either exponential backoff or a delay cap selects it; otherwise every
    /// delay is exactly `propagation-seconds`.
    pub const fn uses_backoff(&self) -> bool {
        self.exponential_backoff_retry || self.max_delay_time.is_some()
    }

    /// Build the immutable policy for one wait.
    pub fn to_policy(&self) -> PropagationPolicy {
        let mut policy = PropagationPolicy::new()
            .base_delay(Duration::from_secs(self.propagation_seconds))
            .retry_limit(RetryLimit::from_config(self.propagation_retry))
            .failure_mode(if self.check_all {
                FailureMode::CheckAll
            } else {
                FailureMode::FailFast
            });

        if self.uses_backoff() {
            policy = policy.backoff(BackoffPolicy {
                exponential: self.exponential_backoff_retry,
                base: Duration::from_secs(self.exponential_backoff_seconds),
                max_delay: self.max_delay_time.map(Duration::from_secs),
            });
        }
        policy
    }
}

// Default value functions for serde.
const fn default_propagation_seconds() -> u64 {
    60
}

const fn default_propagation_retry() -> i64 {
    6
}

const fn default_backoff_seconds() -> u64 {
    5
}

const fn default_query_timeout() -> u64 {
    10
}

const fn default_dns_port() -> u16 {
    DNS_PORT
}
