//! `dns-01` authenticator: publish challenge records, then wait for them.
//!
//! The record itself is written by a [`DnsUpdater`] (an RFC 2136 client, a
//! provider API, ...). [`PropagationAuthenticator`] wraps any updater and
//! only reports a challenge as ready once every authority serves it.

use async_trait::async_trait;
use hickory_proto::rr::{Name, RecordType};
use tracing::{info, warn};

use crate::error::WaitDnsError;
use crate::policy::PropagationPolicy;
use crate::query::DirectQuery;
use crate::resolver::StubResolver;
use crate::waiter::{PropagationReport, PropagationWaiter};

/// TTL for challenge records (seconds).
pub const DEFAULT_TTL: u32 = 120;

/// Creates and deletes TXT records on the primary server.
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    /// Submit a TXT record. Returns once the update is accepted.
    async fn add_txt_record(&self, record_name: &str, value: &str, ttl: u32) -> crate::Result<()>;

    /// Remove a TXT record previously added.
    async fn del_txt_record(&self, record_name: &str, value: &str) -> crate::Result<()>;
}

/// One `dns-01` challenge as handed over by the ACME client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dns01Challenge {
    /// Domain being validated.
    pub domain: String,
    /// Key authorization digest to publish.
    pub validation: String,
}

impl Dns01Challenge {
    pub fn new(domain: impl Into<String>, validation: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            validation: validation.into(),
        }
    }

    /// `_acme-challenge.<domain>`, without a trailing dot.
    pub fn validation_domain_name(&self) -> String {
        let domain = self.domain.trim_end_matches('.');
        let domain = domain.strip_prefix("*.").unwrap_or(domain);
        format!("_acme-challenge.{domain}")
    }

    /// The validation domain as a fully-qualified DNS name.
    pub fn validation_name(&self) -> crate::Result<Name> {
        let text = self.validation_domain_name();
        let mut name = Name::from_utf8(&text).map_err(|e| WaitDnsError::InvalidName {
            name: text.clone(),
            message: e.to_string(),
        })?;
        name.set_fqdn(true);
        Ok(name)
    }
}

/// Dynamic-update authenticator that also waits for propagation.
pub struct PropagationAuthenticator<U, R, Q> {
    updater: U,
    waiter: PropagationWaiter<R, Q>,
    policy: PropagationPolicy,
    ttl: u32,
}

impl<U, R, Q> PropagationAuthenticator<U, R, Q>
where
    U: DnsUpdater,
    R: StubResolver,
    Q: DirectQuery,
{
    pub const fn new(
        updater: U,
        waiter: PropagationWaiter<R, Q>,
        policy: PropagationPolicy,
    ) -> Self {
        Self {
            updater,
            waiter,
            policy,
            ttl: DEFAULT_TTL,
        }
    }

    /// Set the TTL of published records
    #[must_use]
    pub const fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub const fn updater(&self) -> &U {
        &self.updater
    }

    pub const fn waiter(&self) -> &PropagationWaiter<R, Q> {
        &self.waiter
    }

    /// Publish every challenge record, then wait until each one has reached
    /// all of its zone's authorities.
    ///
    /// The first failure is returned and must abort issuance: nothing is
    /// reported as ready unless every wait succeeded.
    pub async fn perform(
        &self,
        challenges: &[Dns01Challenge],
    ) -> crate::Result<Vec<PropagationReport>> {
        let mut names = Vec::with_capacity(challenges.len());
        for challenge in challenges {
            let name = challenge.validation_name()?;
            self.updater
                .add_txt_record(
                    &challenge.validation_domain_name(),
                    &challenge.validation,
                    self.ttl,
                )
                .await?;
            names.push(name);
        }

        let mut reports = Vec::with_capacity(challenges.len());
        for (challenge, name) in challenges.iter().zip(&names) {
            let report = self
                .waiter
                .wait_for_propagation(name, RecordType::TXT, &challenge.validation, &self.policy)
                .await?;
            info!(
                domain = %challenge.domain,
                checks = report.checks,
                "challenge record propagated"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Delete every challenge record.
    ///
    /// All deletions are attempted; the first failure is returned.
    pub async fn cleanup(&self, challenges: &[Dns01Challenge]) -> crate::Result<()> {
        let mut first_error = None;
        for challenge in challenges {
            let record_name = challenge.validation_domain_name();
            if let Err(e) = self
                .updater
                .del_txt_record(&record_name, &challenge.validation)
                .await
            {
                warn!(record = %record_name, error = %e, "failed to delete challenge record");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::locator::AuthorityLocator;
    use crate::policy::RetryLimit;
    use crate::query::mock::ScriptedQuery;
    use crate::resolver::mock::{example_com, MockResolver};

    #[derive(Default)]
    struct RecordingUpdater {
        events: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingUpdater {
        fn failing_on(record: &'static str) -> Self {
            Self {
                fail_on: Some(record),
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: String, record_name: &str) -> crate::Result<()> {
            self.events.lock().unwrap().push(event);
            match self.fail_on {
                Some(name) if name == record_name => {
                    Err(WaitDnsError::Update(format!("REFUSED for {record_name}")))
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DnsUpdater for RecordingUpdater {
        async fn add_txt_record(
            &self,
            record_name: &str,
            value: &str,
            ttl: u32,
        ) -> crate::Result<()> {
            self.record(format!("add {record_name} {value} {ttl}"), record_name)
        }

        async fn del_txt_record(&self, record_name: &str, value: &str) -> crate::Result<()> {
            self.record(format!("del {record_name} {value}"), record_name)
        }
    }

    fn authenticator(
        updater: RecordingUpdater,
        query: ScriptedQuery,
        retry: RetryLimit,
    ) -> PropagationAuthenticator<RecordingUpdater, MockResolver, ScriptedQuery> {
        let waiter = PropagationWaiter::new(AuthorityLocator::new(example_com()), query);
        let policy = PropagationPolicy::new()
            .base_delay(std::time::Duration::from_secs(1))
            .retry_limit(retry);
        PropagationAuthenticator::new(updater, waiter, policy)
    }

    #[test]
    fn test_validation_domain_name() {
        assert_eq!(
            Dns01Challenge::new("example.com", "t").validation_domain_name(),
            "_acme-challenge.example.com"
        );
        assert_eq!(
            Dns01Challenge::new("*.example.com.", "t").validation_domain_name(),
            "_acme-challenge.example.com"
        );
        let name = Dns01Challenge::new("www.example.com", "t")
            .validation_name()
            .unwrap();
        assert!(name.is_fqdn());
        assert_eq!(name.to_string(), "_acme-challenge.www.example.com.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_perform_publishes_then_waits() {
        let query = ScriptedQuery::new()
            .reply("192.0.2.1", "TXT token-a token-b")
            .reply("192.0.2.2", "TXT token-b")
            .reply("192.0.2.2", "TXT token-a token-b");
        let auth = authenticator(RecordingUpdater::default(), query, RetryLimit::Limited(3));
        let challenges = [
            Dns01Challenge::new("example.com", "token-a"),
            Dns01Challenge::new("www.example.com", "token-b"),
        ];

        let reports = assert_ok!(auth.perform(&challenges).await);

        assert_eq!(
            auth.updater().events(),
            [
                "add _acme-challenge.example.com token-a 120",
                "add _acme-challenge.www.example.com token-b 120",
            ]
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].checks, 3);
        assert_eq!(reports[0].retries, 1);
        assert_eq!(reports[1].checks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_perform_fails_when_propagation_exhausted() {
        let query = ScriptedQuery::new()
            .reply("192.0.2.1", "TXT token-a")
            .reply("192.0.2.2", "TXT stale");
        let auth = authenticator(RecordingUpdater::default(), query, RetryLimit::Limited(2));

        let err = assert_err!(
            auth.perform(&[Dns01Challenge::new("example.com", "token-a")])
                .await
        );
        assert!(err.is_exhausted());
    }

    #[tokio::test]
    async fn test_update_failure_skips_waiting() {
        let updater = RecordingUpdater::failing_on("_acme-challenge.example.com");
        let auth = authenticator(updater, ScriptedQuery::new(), RetryLimit::Limited(2));

        let err = assert_err!(
            auth.perform(&[Dns01Challenge::new("example.com", "token-a")])
                .await
        );
        assert!(matches!(err, WaitDnsError::Update(_)));
        assert!(auth.waiter().query().calls().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_attempts_every_record() {
        let updater = RecordingUpdater::failing_on("_acme-challenge.example.com");
        let auth = authenticator(updater, ScriptedQuery::new(), RetryLimit::Limited(2));
        let challenges = [
            Dns01Challenge::new("example.com", "token-a"),
            Dns01Challenge::new("www.example.com", "token-b"),
        ];

        let err = assert_err!(auth.cleanup(&challenges).await);
        assert!(matches!(err, WaitDnsError::Update(_)));
        assert_eq!(
            auth.updater().events(),
            [
                "del _acme-challenge.example.com token-a",
                "del _acme-challenge.www.example.com token-b",
            ]
        );
    }
}
