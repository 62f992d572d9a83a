//! Propagation waiting: poll every authority until it serves the expected value.
//!
//! Authorities are checked one at a time in worklist order. A failed check
//! (wrong content or no usable response) sends the authority to the back of
//! the worklist after a delay, as long as its address still has retry budget.
//! The budget is keyed by address only: two host names sharing an address
//! share one budget.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::Duration;

use hickory_proto::rr::{Name, RecordType};
use tracing::{debug, error, info, warn};

use crate::config::WaitConfig;
use crate::error::{ExhaustedAuthority, QueryFailure, WaitDnsError};
use crate::locator::{Authority, AuthorityLocator};
use crate::policy::{FailureMode, PropagationPolicy};
use crate::query::{DirectQuery, UdpDirectQuery};
use crate::resolver::{HickoryStubResolver, StubResolver};

/// What a successful wait observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Authorities that were checked, in worklist order.
    pub authorities: Vec<Authority>,
    /// Direct queries sent.
    pub checks: u32,
    /// Re-checks scheduled after a failed check.
    pub retries: u32,
    /// Total time spent sleeping between checks.
    pub slept: Duration,
}

/// Authorities still waiting for a successful check.
#[derive(Debug, Default)]
struct Worklist(VecDeque<Authority>);

impl Worklist {
    fn pop(&mut self) -> Option<Authority> {
        self.0.pop_front()
    }

    fn requeue(&mut self, authority: Authority) {
        self.0.push_back(authority);
    }
}

impl From<Vec<Authority>> for Worklist {
    fn from(authorities: Vec<Authority>) -> Self {
        Self(authorities.into())
    }
}

/// Retries used so far, per authority address. Lives for one wait only.
#[derive(Debug, Default)]
struct RetryState(HashMap<IpAddr, u32>);

impl RetryState {
    fn attempts(&self, address: IpAddr) -> u32 {
        self.0.get(&address).copied().unwrap_or(0)
    }

    /// Count one more retry and return the count before it.
    fn record_retry(&mut self, address: IpAddr) -> u32 {
        let attempts = self.0.entry(address).or_insert(0);
        let before = *attempts;
        *attempts = attempts.saturating_add(1);
        before
    }
}

enum Check {
    Confirmed,
    Mismatch,
    Failed(QueryFailure),
}

/// Drives the check/retry loop over the authorities of a zone.
pub struct PropagationWaiter<R, Q> {
    locator: AuthorityLocator<R>,
    query: Q,
}

impl PropagationWaiter<HickoryStubResolver, UdpDirectQuery> {
    /// Waiter using the system resolver and plain UDP queries, set up from `config`.
    pub fn from_config(config: &WaitConfig) -> crate::Result<Self> {
        let resolver = HickoryStubResolver::from_system_conf()?;
        let locator = AuthorityLocator::new(resolver).with_ipv6(config.ipv6);
        let query = UdpDirectQuery::new()
            .port(config.dns_port)
            .timeout(config.query_timeout());
        Ok(Self::new(locator, query))
    }
}

impl<R: StubResolver, Q: DirectQuery> PropagationWaiter<R, Q> {
    pub const fn new(locator: AuthorityLocator<R>, query: Q) -> Self {
        Self { locator, query }
    }

    pub const fn locator(&self) -> &AuthorityLocator<R> {
        &self.locator
    }

    pub const fn query(&self) -> &Q {
        &self.query
    }

    /// Wait until every authority of the zone enclosing `name` serves `expected`.
    ///
    /// Resolution failures abort immediately. Individual query failures only
    /// consume retry budget. Fails with [`WaitDnsError::PropagationExhausted`]
    /// once an authority runs out of retries.
    pub async fn wait_for_propagation(
        &self,
        name: &Name,
        rtype: RecordType,
        expected: &str,
        policy: &PropagationPolicy,
    ) -> crate::Result<PropagationReport> {
        let authorities = self.locator.locate(name).await?;
        self.wait_on(authorities, name, rtype, expected, policy).await
    }

    /// Same loop as [`Self::wait_for_propagation`] over an already known set
    /// of authorities.
    pub async fn wait_on(
        &self,
        authorities: Vec<Authority>,
        name: &Name,
        rtype: RecordType,
        expected: &str,
        policy: &PropagationPolicy,
    ) -> crate::Result<PropagationReport> {
        info!(
            name = %name,
            count = authorities.len(),
            "authoritative name servers to check"
        );

        let mut worklist = Worklist::from(authorities.clone());
        let mut retries = RetryState::default();
        let mut failed = Vec::new();
        let mut report = PropagationReport {
            authorities,
            ..PropagationReport::default()
        };

        while let Some(authority) = worklist.pop() {
            debug!(authority = %authority, "checking");
            report.checks = report.checks.saturating_add(1);

            match self.check(&authority, name, rtype, expected).await {
                Check::Confirmed => {
                    debug!(authority = %authority, "has the expected value");
                    continue;
                }
                Check::Mismatch => {}
                Check::Failed(e) => {
                    warn!(authority = %authority, error = %e, "query failed");
                }
            }

            let attempts = retries.attempts(authority.address);
            if policy.retry_limit.allows(attempts) {
                info!(
                    authority = %authority,
                    attempt = attempts,
                    limit = %policy.retry_limit,
                    "expected value not served yet, will retry"
                );
                retries.record_retry(authority.address);

                let jitter = if policy.uses_jitter() {
                    rand::random::<f64>()
                } else {
                    0.0
                };
                let delay = policy.delay_for(attempts, jitter);
                report.retries = report.retries.saturating_add(1);
                report.slept = report.slept.saturating_add(delay);
                worklist.requeue(authority);
                tokio::time::sleep(delay).await;
            } else {
                error!(
                    authority = %authority,
                    retries = attempts,
                    "expected value not served, max retry reached"
                );
                failed.push(ExhaustedAuthority {
                    hostname: authority.hostname,
                    address: authority.address,
                    retries: attempts,
                });
                if policy.failure_mode == FailureMode::FailFast {
                    break;
                }
            }
        }

        if !failed.is_empty() {
            return Err(WaitDnsError::PropagationExhausted { failed });
        }

        info!(
            name = %name,
            checks = report.checks,
            slept = ?report.slept,
            "all authoritative servers have the expected value"
        );
        Ok(report)
    }

    async fn check(
        &self,
        authority: &Authority,
        name: &Name,
        rtype: RecordType,
        expected: &str,
    ) -> Check {
        match self.query.query(name, rtype, authority.address).await {
            // Plain substring search over the whole rendered response.
            Ok(response) if response.contains(expected) => Check::Confirmed,
            Ok(_) => Check::Mismatch,
            Err(e) => Check::Failed(e),
        }
    }
}
