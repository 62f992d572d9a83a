//! Stub resolver capability used to discover a zone's authorities.
//!
//! The trait can be swapped for testing. Production uses hickory-resolver
//! with the system configuration.

use async_trait::async_trait;
use hickory_proto::rr::{Name, Record, RecordType};
use hickory_resolver::TokioResolver;
use tracing::debug;

use crate::error::ResolutionError;

/// Recursive lookups through the system's caching resolver.
#[async_trait]
pub trait StubResolver: Send + Sync {
    /// Look up the records of `rtype` at `name`.
    ///
    /// A name without such records (including NXDOMAIN) must fail with
    /// [`ResolutionError::NoAnswer`] so callers can tell it apart from a
    /// broken lookup.
    async fn resolve_records(
        &self,
        name: &Name,
        rtype: RecordType,
    ) -> Result<Vec<Record>, ResolutionError>;

    /// Find the zone apex enclosing `name`.
    ///
    /// Walks from `name` toward the root and returns the first name that owns
    /// an SOA record. An SOA answer owned by another name (reached through a
    /// CNAME or DNAME) does not count.
    async fn resolve_zone_apex(&self, name: &Name) -> Result<Name, ResolutionError> {
        let mut candidate = name.clone();
        candidate.set_fqdn(true);

        loop {
            match self.resolve_records(&candidate, RecordType::SOA).await {
                Ok(records) => {
                    let owns_soa = records
                        .iter()
                        .any(|r| r.record_type() == RecordType::SOA && r.name() == &candidate);
                    if owns_soa {
                        debug!(name = %name, zone = %candidate, "found zone apex");
                        return Ok(candidate);
                    }
                    debug!(name = %candidate, "SOA answer owned by another name");
                }
                Err(e) if e.is_no_answer() => {}
                Err(e) => return Err(e),
            }

            if candidate.is_root() {
                return Err(ResolutionError::NoZone { name: name.clone() });
            }
            candidate = candidate.base_name();
            candidate.set_fqdn(true);
        }
    }
}

/// Production stub resolver using hickory-resolver.
pub struct HickoryStubResolver {
    resolver: TokioResolver,
}

impl HickoryStubResolver {
    /// Create a resolver from the system configuration (`/etc/resolv.conf`).
    pub fn from_system_conf() -> Result<Self, ResolutionError> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ResolutionError::SystemConfig {
                message: e.to_string(),
            })?
            .build();
        Ok(Self { resolver })
    }

    /// Wrap an already configured resolver.
    #[must_use]
    pub const fn new(resolver: TokioResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl StubResolver for HickoryStubResolver {
    async fn resolve_records(
        &self,
        name: &Name,
        rtype: RecordType,
    ) -> Result<Vec<Record>, ResolutionError> {
        debug!(name = %name, rtype = %rtype, "stub lookup");

        match self.resolver.lookup(name.clone(), rtype).await {
            Ok(lookup) => Ok(lookup.records().to_vec()),
            Err(e) if e.is_no_records_found() => Err(ResolutionError::NoAnswer {
                name: name.clone(),
                rtype,
            }),
            Err(e) => Err(ResolutionError::Lookup {
                name: name.clone(),
                rtype,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hickory_proto::rr::rdata::{A, AAAA, NS, SOA};
    use hickory_proto::rr::RData;

    use super::*;

    pub fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    /// In-memory resolver; unknown queries answer `NoAnswer`.
    #[derive(Default)]
    pub struct MockResolver {
        records: HashMap<(Name, RecordType), Vec<Record>>,
        failures: HashMap<(Name, RecordType), ResolutionError>,
        lookups: AtomicUsize,
    }

    impl MockResolver {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(&mut self, owner: &str, rtype: RecordType, rdata: RData) {
            let owner = name(owner);
            self.records
                .entry((owner.clone(), rtype))
                .or_default()
                .push(Record::from_rdata(owner, 300, rdata));
        }

        pub fn soa(mut self, zone: &str) -> Self {
            let soa = SOA::new(
                name(&format!("ns1.{zone}")),
                name(&format!("hostmaster.{zone}")),
                2024_01_01,
                3600,
                600,
                86400,
                300,
            );
            self.push(zone, RecordType::SOA, RData::SOA(soa));
            self
        }

        /// SOA answer for `alias` that is actually owned by `zone`.
        pub fn aliased_soa(mut self, alias: &str, zone: &str) -> Self {
            let soa = SOA::new(
                name(&format!("ns1.{zone}")),
                name(&format!("hostmaster.{zone}")),
                1,
                3600,
                600,
                86400,
                300,
            );
            let owner = name(zone);
            self.records
                .entry((name(alias), RecordType::SOA))
                .or_default()
                .push(Record::from_rdata(owner, 300, RData::SOA(soa)));
            self
        }

        pub fn ns(mut self, zone: &str, host: &str) -> Self {
            self.push(zone, RecordType::NS, RData::NS(NS(name(host))));
            self
        }

        pub fn addr(mut self, host: &str, address: &str) -> Self {
            match address.parse::<IpAddr>().unwrap() {
                IpAddr::V4(v4) => self.push(host, RecordType::A, RData::A(A(v4))),
                IpAddr::V6(v6) => self.push(host, RecordType::AAAA, RData::AAAA(AAAA(v6))),
            }
            self
        }

        pub fn fail(mut self, owner: &str, rtype: RecordType, message: &str) -> Self {
            let owner = name(owner);
            self.failures.insert(
                (owner.clone(), rtype),
                ResolutionError::Lookup {
                    name: owner,
                    rtype,
                    message: message.to_string(),
                },
            );
            self
        }

        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StubResolver for MockResolver {
        async fn resolve_records(
            &self,
            name: &Name,
            rtype: RecordType,
        ) -> Result<Vec<Record>, ResolutionError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let key = (name.clone(), rtype);
            if let Some(err) = self.failures.get(&key) {
                return Err(err.clone());
            }
            self.records
                .get(&key)
                .cloned()
                .ok_or_else(|| ResolutionError::NoAnswer {
                    name: name.clone(),
                    rtype,
                })
        }
    }

    /// `example.com` with two name servers, one address each.
    pub fn example_com() -> MockResolver {
        MockResolver::new()
            .soa("example.com.")
            .ns("example.com.", "ns1.example.com.")
            .ns("example.com.", "ns2.example.com.")
            .addr("ns1.example.com.", "192.0.2.1")
            .addr("ns2.example.com.", "192.0.2.2")
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{name, MockResolver};
    use super::*;

    #[tokio::test]
    async fn test_zone_apex_walks_up() {
        let resolver = MockResolver::new().soa("example.com.");
        let zone = resolver
            .resolve_zone_apex(&name("_acme-challenge.www.example.com."))
            .await
            .unwrap();
        assert_eq!(zone, name("example.com."));
        // _acme-challenge.www, www, example.com
        assert_eq!(resolver.lookups(), 3);
    }

    #[tokio::test]
    async fn test_zone_apex_of_apex() {
        let resolver = MockResolver::new().soa("example.com.");
        let zone = resolver.resolve_zone_apex(&name("example.com.")).await.unwrap();
        assert_eq!(zone, name("example.com."));
        assert_eq!(resolver.lookups(), 1);
    }

    #[tokio::test]
    async fn test_zone_apex_prefers_closest_zone() {
        let resolver = MockResolver::new()
            .soa("example.com.")
            .soa("sub.example.com.");
        let zone = resolver
            .resolve_zone_apex(&name("_acme-challenge.sub.example.com."))
            .await
            .unwrap();
        assert_eq!(zone, name("sub.example.com."));
    }

    #[tokio::test]
    async fn test_zone_apex_skips_aliased_soa() {
        let resolver = MockResolver::new()
            .aliased_soa("www.example.com.", "cdn.example.net.")
            .soa("example.com.");
        let zone = resolver
            .resolve_zone_apex(&name("www.example.com."))
            .await
            .unwrap();
        assert_eq!(zone, name("example.com."));
    }

    #[tokio::test]
    async fn test_zone_apex_accepts_relative_name() {
        let resolver = MockResolver::new().soa("example.com.");
        let zone = resolver
            .resolve_zone_apex(&name("www.example.com"))
            .await
            .unwrap();
        assert_eq!(zone, name("example.com."));
    }

    #[tokio::test]
    async fn test_zone_apex_not_found() {
        let resolver = MockResolver::new();
        let err = resolver
            .resolve_zone_apex(&name("host.invalid."))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::NoZone {
                name: name("host.invalid.")
            }
        );
        // host.invalid, invalid, root
        assert_eq!(resolver.lookups(), 3);
    }

    #[tokio::test]
    async fn test_zone_apex_lookup_failure_is_not_skipped() {
        let resolver = MockResolver::new()
            .soa("example.com.")
            .fail("www.example.com.", RecordType::SOA, "SERVFAIL");
        let err = resolver
            .resolve_zone_apex(&name("www.example.com."))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Lookup { .. }));
    }
}
