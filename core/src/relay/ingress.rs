use crate::prelude::{DoaError, DoaResult};
use crate::relay::registry::SubscriberRegistry;
use crate::wire::parse_datagram;
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Receive buffer size; longer datagrams are truncated by the socket.
pub const DEFAULT_MAX_DATAGRAM: usize = 4096;

/// UDP listener feeding parsed measurements into the registry.
pub struct IngressListener {
    socket: UdpSocket,
    registry: Arc<SubscriberRegistry>,
    max_datagram: usize,
}

impl IngressListener {
    /// Binds the ingress socket. Failure here is fatal for the relay.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        max_datagram: usize,
    ) -> DoaResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DoaError::Bind { addr, source })?;
        info!("ingress listening on udp://{}", socket.local_addr()?);
        Ok(Self {
            socket,
            registry,
            max_datagram: max_datagram.max(1),
        })
    }

    pub fn local_addr(&self) -> DoaResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Decodes one datagram and broadcasts every well-formed record in it.
    /// Returns the number of measurements broadcast.
    pub fn handle_datagram(&self, buf: &[u8]) -> usize {
        let parsed = parse_datagram(buf);
        self.registry
            .metrics()
            .record_datagram(parsed.measurements.len(), parsed.discarded);
        for measurement in &parsed.measurements {
            self.registry.broadcast(measurement);
        }
        parsed.measurements.len()
    }

    /// Receives forever. Receive errors are transient and skipped.
    pub async fn run(self) {
        let mut buf = vec![0u8; self.max_datagram];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    let count = self.handle_datagram(&buf[..len]);
                    debug!("{} byte(s) from {} -> {} measurement(s)", len, peer, count);
                }
                Err(err) => debug!("ingress receive error: {}", err),
            }
        }
    }
}
