//! Error types for authority discovery and propagation checks.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use hickory_proto::rr::{Name, RecordType};
use thiserror::Error;

/// Errors that can end a propagation wait.
#[derive(Error, Debug)]
pub enum WaitDnsError {
    /// The zone, its NS set or a name server address could not be resolved.
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// At least one authority never served the expected value.
    #[error("propagation incomplete: {}", format_exhausted(.failed))]
    PropagationExhausted {
        /// Authorities that ran out of retry budget.
        failed: Vec<ExhaustedAuthority>,
    },

    /// The dynamic update collaborator reported a failure.
    #[error("dns update failed: {0}")]
    Update(String),

    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A challenge domain is not a valid DNS name.
    #[error("invalid domain name {name:?}: {message}")]
    InvalidName { name: String, message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaitDnsError {
    /// Returns true if the wait ran and some authority never converged.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::PropagationExhausted { .. })
    }
}

/// An authority that ran out of retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedAuthority {
    /// Name server host name.
    pub hostname: Name,
    /// Address that was queried.
    pub address: IpAddr,
    /// Retries used on this address before giving up.
    pub retries: u32,
}

impl fmt::Display for ExhaustedAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) after {} retries",
            self.hostname, self.address, self.retries
        )
    }
}

fn format_exhausted(failed: &[ExhaustedAuthority]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures of the stub resolver while building the worklist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No ancestor of the name owns an SOA record.
    #[error("no zone found for {name}")]
    NoZone { name: Name },

    /// The name exists but has no records of the requested type, or does not exist.
    #[error("no {rtype} records for {name}")]
    NoAnswer { name: Name, rtype: RecordType },

    /// A name server host name has no usable address.
    #[error("name server {host} has no address")]
    NoAddresses { host: Name },

    /// The system resolver configuration could not be read.
    #[error("cannot set up system resolver: {message}")]
    SystemConfig { message: String },

    /// The lookup itself failed (timeout, SERVFAIL, transport).
    #[error("{rtype} lookup for {name} failed: {message}")]
    Lookup {
        name: Name,
        rtype: RecordType,
        message: String,
    },
}

impl ResolutionError {
    /// Returns true if the resolver answered but had nothing for the query.
    #[must_use]
    pub const fn is_no_answer(&self) -> bool {
        matches!(self, Self::NoAnswer { .. })
    }
}

/// A single direct query that produced no usable response.
///
/// Never escapes the waiter: it counts as a failed check.
#[derive(Error, Debug)]
pub enum QueryFailure {
    /// No response within the per-query timeout.
    #[error("no response from {server} within {after:?}")]
    Timeout { server: IpAddr, after: Duration },

    /// Socket error.
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    /// The query message could not be built.
    #[error("failed to encode query: {0}")]
    Encode(String),

    /// The response could not be parsed.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The response answered a different query.
    #[error("response id {got} does not match query id {expected}")]
    IdMismatch { expected: u16, got: u16 },
}
