//! # waitdns
//!
//! Wait for a DNS record update to reach every authoritative name server of a
//! zone before a `dns-01` challenge is declared complete.
//!
//! Publishing a TXT record through a dynamic update does not make it visible
//! everywhere at once: each authoritative server of the zone picks it up on
//! its own schedule. This crate finds those servers and polls each of them
//! directly until all of them serve the expected value.
//!
//! ## Data Flow
//!
//! ```text
//! AuthorityLocator::locate(name)
//!   zone apex (SOA walk) -> NS set -> A/AAAA per NS
//!   -> Vec<Authority>                      one entry per address
//!
//! PropagationWaiter::wait_for_propagation(name, type, expected, policy)
//!   worklist = authorities
//!   loop: pop front -> direct query -> substring match?
//!     yes -> confirmed, dropped from the worklist
//!     no  -> budget left? sleep(delay) and push back : exhausted, abort
//! ```
//!
//! [`PropagationAuthenticator`] ties the waiter to a [`DnsUpdater`], so a
//! certificate client can publish its challenge records and only return once
//! they are visible on every authority.

pub mod authenticator;
pub mod config;
pub mod error;
pub mod locator;
pub mod policy;
pub mod query;
pub mod resolver;
pub mod waiter;

pub use authenticator::{Dns01Challenge, DnsUpdater, PropagationAuthenticator};
pub use config::WaitConfig;
pub use error::{ExhaustedAuthority, QueryFailure, ResolutionError, WaitDnsError};
pub use locator::{Authority, AuthorityLocator};
pub use policy::{BackoffPolicy, FailureMode, PropagationPolicy, RetryLimit};
pub use query::{DirectQuery, UdpDirectQuery};
pub use resolver::{HickoryStubResolver, StubResolver};
pub use waiter::{PropagationReport, PropagationWaiter};

pub use hickory_proto::rr::{Name, RecordType};

/// Result type for waitdns operations.
pub type Result<T> = std::result::Result<T, WaitDnsError>;
