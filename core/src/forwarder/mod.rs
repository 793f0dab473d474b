//! Producer-side senders that carry measurement lines toward a relay.
//!
//! `udp://` destinations get a fire-and-forget [`DatagramForwarder`];
//! `tcp://` and `tls://` destinations get a [`QueuedForwarder`] that keeps a
//! persistent connection and retries each line until it is written.

pub mod connector;
pub mod datagram;
pub mod destination;
pub mod queued;
pub mod tls;

pub use connector::{Connector, TcpStreamConnector, TlsStreamConnector};
pub use datagram::DatagramForwarder;
pub use destination::{Destination, Scheme};
pub use queued::{QueuedForwarder, DEFAULT_RETRY_BACKOFF};
pub use tls::TrustPolicy;

use crate::prelude::DoaResult;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub destination: Destination,
    pub trust: TrustPolicy,
    pub retry_backoff: Duration,
}

/// Either transport variant behind one producer-facing call.
pub enum Forwarder {
    Datagram(DatagramForwarder),
    Queued(QueuedForwarder),
}

impl Forwarder {
    /// Sets up the transport for `config.destination`. Must run inside a
    /// tokio runtime; queued variants spawn their worker here.
    pub async fn connect(config: &ForwarderConfig) -> DoaResult<Self> {
        let forwarder = match config.destination.scheme {
            Scheme::Udp => {
                Forwarder::Datagram(DatagramForwarder::bind(&config.destination).await?)
            }
            Scheme::Tcp => Forwarder::Queued(QueuedForwarder::spawn(
                TcpStreamConnector::new(&config.destination),
                config.retry_backoff,
            )),
            Scheme::Tls => Forwarder::Queued(QueuedForwarder::spawn(
                TlsStreamConnector::new(&config.destination, &config.trust)?,
                config.retry_backoff,
            )),
        };
        log::info!("forwarding measurements to {}", config.destination);
        Ok(forwarder)
    }

    /// Sends (datagram) or enqueues (queued) one line.
    pub async fn forward(&self, line: &str) -> DoaResult<()> {
        match self {
            Forwarder::Datagram(sender) => sender.send(line).await,
            Forwarder::Queued(queue) => queue.enqueue(line.to_string()),
        }
    }

    /// Label used when a failed send is annotated in the session log.
    pub fn error_label(&self) -> &'static str {
        match self {
            Forwarder::Datagram(_) => "UDP_SEND_ERROR",
            Forwarder::Queued(_) => "SEND_ERROR",
        }
    }

    pub async fn shutdown(self, deadline: Duration) -> DoaResult<()> {
        match self {
            Forwarder::Datagram(_) => Ok(()),
            Forwarder::Queued(queue) => queue.shutdown(deadline).await,
        }
    }
}
