use crate::forwarder::destination::Destination;
use crate::forwarder::tls::{client_config, TrustPolicy};
use crate::prelude::{DoaError, DoaResult};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Opens the stream a [`QueuedForwarder`](super::QueuedForwarder) writes to.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncWrite + Unpin + Send + 'static;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP, one line per measurement.
pub struct TcpStreamConnector {
    authority: String,
}

impl TcpStreamConnector {
    pub fn new(destination: &Destination) -> Self {
        Self {
            authority: destination.authority(),
        }
    }
}

impl Connector for TcpStreamConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.authority.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// TLS over TCP using the configured trust policy.
pub struct TlsStreamConnector {
    authority: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
}

impl TlsStreamConnector {
    pub fn new(destination: &Destination, trust: &TrustPolicy) -> DoaResult<Self> {
        let server_name = ServerName::try_from(destination.host.clone())
            .map_err(|err| DoaError::Tls(format!("server name {:?}: {err}", destination.host)))?;
        let config = client_config(trust)?;
        Ok(Self {
            authority: destination.authority(),
            server_name,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }
}

impl Connector for TlsStreamConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self) -> io::Result<TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(self.authority.as_str()).await?;
        tcp.set_nodelay(true)?;
        self.connector.connect(self.server_name.clone(), tcp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair};
    use rustls::crypto::ring;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_rustls::TlsAcceptor;

    struct TestCa {
        cert: Certificate,
        key: KeyPair,
    }

    impl TestCa {
        fn new(name: &str) -> Self {
            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.distinguished_name.push(DnType::CommonName, name);
            let cert = params.self_signed(&key).unwrap();
            Self { cert, key }
        }

        /// Server certificate for 127.0.0.1 issued by this CA.
        fn issue_loopback(&self) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(vec!["127.0.0.1".to_string()]).unwrap();
            params.distinguished_name.push(DnType::CommonName, "doa relay");
            let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
            let key = PrivatePkcs8KeyDer::from(key.serialize_der());
            (cert.der().clone(), key.into())
        }

        fn write_pem(&self, dir: &std::path::Path) -> std::path::PathBuf {
            let path = dir.join("ca.pem");
            std::fs::write(&path, self.cert.pem()).unwrap();
            path
        }
    }

    /// Accepts one TLS connection on loopback and returns the first line read.
    async fn spawn_tls_server(
        cert: CertificateDer<'static>,
        key: PrivateKeyDer<'static>,
    ) -> (Destination, JoinHandle<io::Result<String>>) {
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await?;
            let stream = acceptor.accept(tcp).await?;
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).await?;
            Ok(line)
        });
        let destination = format!("tls://127.0.0.1:{port}").parse().unwrap();
        (destination, task)
    }

    #[tokio::test]
    async fn tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let destination: Destination = format!("tcp://127.0.0.1:{port}").parse().unwrap();

        let connector = TcpStreamConnector::new(&destination);
        let (client, accepted) = tokio::join!(connector.connect(), listener.accept());
        let mut client = client.unwrap();
        let (mut server, _) = accepted.unwrap();

        client.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
    }

    #[test]
    fn tls_connector_accepts_ip_and_dns_hosts() {
        for dest in ["tls://127.0.0.1:6677/", "tls://relay.local:6677/"] {
            let destination: Destination = dest.parse().unwrap();
            TlsStreamConnector::new(&destination, &TrustPolicy::AcceptAny).unwrap();
        }
    }

    #[tokio::test]
    async fn accept_any_delivers_to_self_signed_server() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["relay.local".to_string()]).unwrap();
        let key = PrivatePkcs8KeyDer::from(key_pair.serialize_der());
        let (destination, server) = spawn_tls_server(cert.der().clone(), key.into()).await;

        let connector = TlsStreamConnector::new(&destination, &TrustPolicy::AcceptAny).unwrap();
        let mut stream = connector.connect().await.unwrap();
        stream.write_all(b"2024/01/01 00:00:00.000, 45.5\n").await.unwrap();
        stream.flush().await.unwrap();

        let line = server.await.unwrap().unwrap();
        assert_eq!(line, "2024/01/01 00:00:00.000, 45.5\n");
    }

    #[tokio::test]
    async fn ca_file_trusts_its_own_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let ca = TestCa::new("doa test ca");
        let (cert, key) = ca.issue_loopback();
        let (destination, server) = spawn_tls_server(cert, key).await;

        let trust = TrustPolicy::CaFile(ca.write_pem(dir.path()));
        let connector = TlsStreamConnector::new(&destination, &trust).unwrap();
        let mut stream = connector.connect().await.unwrap();
        stream.write_all(b"t, 90.0\n").await.unwrap();
        stream.flush().await.unwrap();

        assert_eq!(server.await.unwrap().unwrap(), "t, 90.0\n");
    }

    #[tokio::test]
    async fn ca_file_rejects_unrelated_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = TestCa::new("server ca").issue_loopback();
        let (destination, _server) = spawn_tls_server(cert, key).await;

        let unrelated = TestCa::new("unrelated ca");
        let trust = TrustPolicy::CaFile(unrelated.write_pem(dir.path()));
        let connector = TlsStreamConnector::new(&destination, &trust).unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(err.to_string().contains("UnknownIssuer"), "{err}");
    }

    #[tokio::test]
    async fn webpki_rejects_unknown_issuer() {
        let (cert, key) = TestCa::new("private ca").issue_loopback();
        let (destination, _server) = spawn_tls_server(cert, key).await;

        let connector = TlsStreamConnector::new(&destination, &TrustPolicy::WebPki).unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(err.to_string().contains("UnknownIssuer"), "{err}");
    }
}
