use crate::forwarder::destination::Destination;
use crate::prelude::DoaResult;
use std::net::IpAddr;
use tokio::net::UdpSocket;

/// Fire-and-forget sender: one datagram per line, failures returned to the
/// caller and not retried.
pub struct DatagramForwarder {
    socket: UdpSocket,
    target: String,
}

impl DatagramForwarder {
    pub async fn bind(destination: &Destination) -> DoaResult<Self> {
        let ipv6 = matches!(destination.host.parse::<IpAddr>(), Ok(IpAddr::V6(_)));
        let local = if ipv6 { "[::]:0" } else { "0.0.0.0:0" };
        Ok(Self {
            socket: UdpSocket::bind(local).await?,
            target: destination.authority(),
        })
    }

    pub async fn send(&self, line: &str) -> DoaResult<()> {
        self.socket
            .send_to(line.as_bytes(), self.target.as_str())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn line_arrives_as_single_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let destination: Destination = format!("udp://127.0.0.1:{port}").parse().unwrap();

        let forwarder = DatagramForwarder::bind(&destination).await.unwrap();
        forwarder.send("2024/01/01 00:00:00.000, 45.5").await.unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"2024/01/01 00:00:00.000, 45.5");
    }

    #[tokio::test]
    async fn rejected_send_is_returned() {
        let destination: Destination = "udp://127.0.0.1:0".parse().unwrap();
        let forwarder = DatagramForwarder::bind(&destination).await.unwrap();
        assert!(forwarder.send("t, 1.0").await.is_err());
    }
}
