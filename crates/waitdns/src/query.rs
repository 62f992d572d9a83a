//! Direct, non-recursive queries to a single authoritative server.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::QueryFailure;

/// Default DNS port.
pub const DNS_PORT: u16 = 53;

/// Default bound on a single query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Large enough for any UDP response we ask for (no EDNS).
const MAX_RESPONSE_LEN: usize = 4096;

/// Ask one server directly, bypassing any caching resolver.
#[async_trait]
pub trait DirectQuery: Send + Sync {
    /// Query `server` for `name`/`rtype` and return the response rendered as text.
    ///
    /// Callers look for the expected value as a substring of this text.
    async fn query(
        &self,
        name: &Name,
        rtype: RecordType,
        server: IpAddr,
    ) -> Result<String, QueryFailure>;
}

/// Single UDP exchange per query, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct UdpDirectQuery {
    port: u16,
    timeout: Duration,
}

impl Default for UdpDirectQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpDirectQuery {
    /// Port 53, ten second timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            port: DNS_PORT,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Send queries to another port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-query timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, target: SocketAddr, request: &[u8]) -> std::io::Result<Vec<u8>> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        // Connected: replies from any other peer are dropped by the kernel.
        socket.connect(target).await?;
        socket.send(request).await?;

        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[async_trait]
impl DirectQuery for UdpDirectQuery {
    async fn query(
        &self,
        name: &Name,
        rtype: RecordType,
        server: IpAddr,
    ) -> Result<String, QueryFailure> {
        let id: u16 = rand::random();
        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(false)
            .add_query(Query::query(name.clone(), rtype));
        let bytes = request
            .to_vec()
            .map_err(|e| QueryFailure::Encode(e.to_string()))?;

        let target = SocketAddr::new(server, self.port);
        debug!(server = %target, name = %name, rtype = %rtype, id, "direct query");

        let buf = tokio::time::timeout(self.timeout, self.exchange(target, &bytes))
            .await
            .map_err(|_| QueryFailure::Timeout {
                server,
                after: self.timeout,
            })??;

        let response = Message::from_vec(&buf).map_err(|e| QueryFailure::Decode(e.to_string()))?;
        if response.id() != id {
            return Err(QueryFailure::IdMismatch {
                expected: id,
                got: response.id(),
            });
        }
        if response.truncated() {
            debug!(server = %target, "response truncated");
        }

        Ok(response.to_string())
    }
}
