//! Authority discovery: which servers must serve the new record.

use std::fmt;
use std::net::IpAddr;

use hickory_proto::rr::{Name, RData, RecordType};
use tracing::{debug, info};

use crate::error::ResolutionError;
use crate::resolver::StubResolver;

/// One authoritative name server address for a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    /// NS target host name.
    pub hostname: Name,
    /// One of its resolved addresses.
    pub address: IpAddr,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hostname, self.address)
    }
}

/// Finds every authority of the zone enclosing a name.
pub struct AuthorityLocator<R> {
    resolver: R,
    ipv6: bool,
}

impl<R: StubResolver> AuthorityLocator<R> {
    /// Locator that checks IPv4 addresses only.
    pub const fn new(resolver: R) -> Self {
        Self {
            resolver,
            ipv6: false,
        }
    }

    /// Also check the AAAA addresses of each name server.
    #[must_use]
    pub const fn with_ipv6(mut self, enabled: bool) -> Self {
        self.ipv6 = enabled;
        self
    }

    /// The underlying stub resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolve the authorities for `name`, one entry per name server address.
    ///
    /// Entries keep NS order, then address order. A multi-homed name server
    /// yields several entries.
    pub async fn locate(&self, name: &Name) -> Result<Vec<Authority>, ResolutionError> {
        let zone = self.resolver.resolve_zone_apex(name).await?;

        let name_servers: Vec<Name> = self
            .resolver
            .resolve_records(&zone, RecordType::NS)
            .await?
            .iter()
            .filter_map(|record| match record.data() {
                RData::NS(ns) => Some(ns.0.clone()),
                _ => None,
            })
            .collect();

        if name_servers.is_empty() {
            return Err(ResolutionError::NoAnswer {
                name: zone,
                rtype: RecordType::NS,
            });
        }

        let mut authorities = Vec::new();
        for host in name_servers {
            let addresses = self.addresses(&host).await?;
            debug!(host = %host, count = addresses.len(), "resolved name server");
            authorities.extend(addresses.into_iter().map(|address| Authority {
                hostname: host.clone(),
                address,
            }));
        }

        info!(
            zone = %zone,
            count = authorities.len(),
            "located authoritative name servers"
        );
        Ok(authorities)
    }

    async fn addresses(&self, host: &Name) -> Result<Vec<IpAddr>, ResolutionError> {
        let mut addresses = self.lookup_addresses(host, RecordType::A).await;

        if self.ipv6 {
            let v6 = self.lookup_addresses(host, RecordType::AAAA).await;
            addresses = match (addresses, v6) {
                (Ok(mut v4), Ok(v6)) => {
                    v4.extend(v6);
                    Ok(v4)
                }
                (Ok(found), Err(e)) | (Err(e), Ok(found)) if e.is_no_answer() => Ok(found),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
        }

        match addresses {
            Ok(found) if !found.is_empty() => Ok(found),
            Ok(_) => Err(ResolutionError::NoAddresses { host: host.clone() }),
            Err(e) if e.is_no_answer() => Err(ResolutionError::NoAddresses { host: host.clone() }),
            Err(e) => Err(e),
        }
    }

    async fn lookup_addresses(
        &self,
        host: &Name,
        rtype: RecordType,
    ) -> Result<Vec<IpAddr>, ResolutionError> {
        let records = self.resolver.resolve_records(host, rtype).await?;
        Ok(records
            .iter()
            .filter_map(|record| match record.data() {
                RData::A(a) => Some(IpAddr::V4(a.0)),
                RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
                _ => None,
            })
            .collect())
    }
}
