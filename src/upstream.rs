//! Upstream query forwarding.
//!
//! `RoundRobinPool` distributes exchanges over the configured resolvers with
//! an atomic rotating cursor. The cursor is a hint: concurrent callers may
//! start from the same endpoint, and strict rotation is not guaranteed. Each
//! try gets its own ephemeral socket and timeout; a transport error, timeout,
//! or mismatched reply id advances to the next endpoint, and the call fails
//! only after one full rotation.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hickory_server::proto::op::Message;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::warn;

/// Largest reply we accept from an upstream (EDNS-sized).
const MAX_REPLY_SIZE: usize = 4096;

/// Abstract upstream exchange, for mocking and switching implementations.
#[async_trait]
pub trait UpstreamExchange: Send + Sync {
    /// Sends `query` upstream and returns the decoded reply.
    async fn exchange(&self, query: &Message) -> Result<Message>;
}

/// Round-robin UDP forwarder over a fixed endpoint list.
pub struct RoundRobinPool {
    endpoints: Vec<SocketAddr>,
    cursor: AtomicUsize,
    try_timeout: Duration,
}

impl RoundRobinPool {
    pub fn new(endpoints: Vec<SocketAddr>, try_timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("Upstream pool requires at least one endpoint");
        }
        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
            try_timeout,
        })
    }

    /// The endpoint index a fresh call would start from.
    fn advance(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len()
    }

    async fn try_exchange(&self, wire: &[u8], endpoint: SocketAddr) -> Result<Message> {
        let bind_addr: SocketAddr = match endpoint.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .context("Failed to bind upstream socket")?;
        socket
            .connect(endpoint)
            .await
            .with_context(|| format!("Failed to connect to upstream {}", endpoint))?;
        socket.send(wire).await.context("Upstream send failed")?;

        let mut buf = [0u8; MAX_REPLY_SIZE];
        let len = timeout(self.try_timeout, socket.recv(&mut buf))
            .await
            .with_context(|| format!("Upstream {} timed out", endpoint))?
            .context("Upstream recv failed")?;
        Message::from_vec(&buf[..len]).context("Failed to decode upstream reply")
    }
}

#[async_trait]
impl UpstreamExchange for RoundRobinPool {
    async fn exchange(&self, query: &Message) -> Result<Message> {
        let wire = query.to_vec().context("Failed to encode upstream query")?;
        let start = self.advance();

        for offset in 0..self.endpoints.len() {
            let endpoint = self.endpoints[(start + offset) % self.endpoints.len()];
            match self.try_exchange(&wire, endpoint).await {
                Ok(reply) if reply.id() == query.id() => return Ok(reply),
                Ok(reply) => {
                    warn!(
                        "Upstream {} answered with id {} (expected {})",
                        endpoint,
                        reply.id(),
                        query.id()
                    );
                }
                Err(e) => {
                    warn!("Upstream {} failed: {:#}", endpoint, e);
                }
            }
        }
        bail!("All upstreams exhausted for query id {}", query.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{Message, MessageType, OpCode, Query};
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{Name, RData, Record, RecordType};
    use std::str::FromStr;
    use std::sync::Arc;

    fn query(id: u16, name: &str) -> Message {
        let mut msg = Message::new();
        msg.set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
        msg
    }

    /// Binds a UDP task that answers every query with one A record.
    async fn spawn_mock_upstream(ip: [u8; 4]) -> SocketAddr {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, src)) = socket.recv_from(&mut buf).await {
                if let Ok(req) = Message::from_vec(&buf[..len]) {
                    let mut reply = Message::new();
                    reply
                        .set_id(req.id())
                        .set_message_type(MessageType::Response)
                        .set_op_code(OpCode::Query)
                        .set_recursion_available(true);
                    if let Some(q) = req.queries().first() {
                        reply.add_query(q.clone());
                        reply.add_answer(Record::from_rdata(
                            q.name().clone(),
                            60,
                            RData::A(A(ip.into())),
                        ));
                    }
                    let _ = socket.send_to(&reply.to_vec().unwrap(), src).await;
                }
            }
        });
        addr
    }

    /// Binds a socket that never answers, to exercise the per-try timeout.
    async fn spawn_silent_upstream() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let _ = socket.recv_from(&mut buf).await;
            }
        });
        addr
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(RoundRobinPool::new(vec![], Duration::from_secs(2)).is_err());
    }

    #[test]
    fn test_cursor_rotates() {
        let pool = RoundRobinPool::new(
            vec!["127.0.0.1:53".parse().unwrap(), "127.0.0.2:53".parse().unwrap()],
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(pool.advance(), 0);
        assert_eq!(pool.advance(), 1);
        assert_eq!(pool.advance(), 0);
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let upstream = spawn_mock_upstream([93, 184, 216, 34]).await;
        let pool = RoundRobinPool::new(vec![upstream], Duration::from_secs(2)).unwrap();

        let reply = pool.exchange(&query(4242, "example.com.")).await.unwrap();
        assert_eq!(reply.id(), 4242);
        assert_eq!(reply.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_failover_to_next_endpoint() {
        let dead = spawn_silent_upstream().await;
        let live = spawn_mock_upstream([1, 2, 3, 4]).await;
        let pool = RoundRobinPool::new(vec![dead, live], Duration::from_millis(200)).unwrap();

        // Cursor starts at the dead endpoint; the call must still succeed.
        let reply = pool.exchange(&query(7, "fail.over.test.")).await.unwrap();
        assert_eq!(reply.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_all_endpoints_exhausted() {
        let dead = spawn_silent_upstream().await;
        let pool = RoundRobinPool::new(vec![dead], Duration::from_millis(100)).unwrap();

        assert!(pool.exchange(&query(9, "no.answer.test.")).await.is_err());
    }
}
