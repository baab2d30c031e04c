//! UDP listener lifecycle.

use super::handler::DnsHandler;
use anyhow::{bail, Context, Result};
use hickory_server::ServerFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;

/// Owns the serving socket and the dispatch loop around [`DnsHandler`].
pub struct DnsListener {
    server: ServerFuture<DnsHandler>,
    local_addr: SocketAddr,
}

impl DnsListener {
    /// Binds the UDP socket and registers it for serving.
    ///
    /// A successful return is the readiness signal: the socket is bound and
    /// accepting datagrams, and `local_addr` reports where (useful when
    /// binding port 0). Startup orchestration sequences dependents on this.
    pub async fn bind(addr: SocketAddr, handler: DnsHandler) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind DNS socket on {}", addr))?;
        let local_addr = socket.local_addr().context("Failed to read bound address")?;
        let mut server = ServerFuture::new(handler);
        server.register_socket(socket);
        info!("DNS listener ready on {}", local_addr);
        Ok(Self { server, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until shutdown or socket failure.
    pub async fn serve(&mut self) -> Result<()> {
        self.server
            .block_until_done()
            .await
            .context("DNS server terminated abnormally")
    }

    /// Closes the socket and waits for in-flight handlers to finish, bounded
    /// by `deadline`. Blocked readers are woken as part of the close.
    pub async fn shutdown(&mut self, deadline: Duration) -> Result<()> {
        info!("Shutting down DNS listener...");
        match tokio::time::timeout(deadline, self.server.shutdown_gracefully()).await {
            Ok(result) => result.context("Error during DNS listener shutdown"),
            Err(_) => bail!("DNS listener shutdown deadline elapsed"),
        }
    }
}
