//! Client-side TLS for the queued forwarder.
//!
//! Trust is an explicit policy. Deployments with self-signed relays run with
//! [`TrustPolicy::AcceptAny`], which skips certificate and hostname checks;
//! anything else verifies the chain.

use crate::prelude::{DoaError, DoaResult};
use log::{debug, warn};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Accept any server certificate, no hostname verification.
    AcceptAny,
    /// Verify against the PEM bundle at this path only.
    CaFile(PathBuf),
    /// Verify against the bundled Mozilla root set.
    WebPki,
}

impl TrustPolicy {
    /// Policy used when none is configured: a supplied CA file means strict
    /// verification, otherwise the relaxed mode.
    pub fn resolve(explicit: Option<TrustPolicy>, ca_file: Option<PathBuf>) -> TrustPolicy {
        match (explicit, ca_file) {
            (Some(policy), _) => policy,
            (None, Some(path)) => TrustPolicy::CaFile(path),
            (None, None) => TrustPolicy::AcceptAny,
        }
    }
}

impl FromStr for TrustPolicy {
    type Err = DoaError;

    /// Accepts `accept_any`, `webpki` or `ca_file:<path>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accept_any" => Ok(TrustPolicy::AcceptAny),
            "webpki" => Ok(TrustPolicy::WebPki),
            other => match other.strip_prefix("ca_file:") {
                Some(path) if !path.is_empty() => Ok(TrustPolicy::CaFile(path.into())),
                _ => Err(DoaError::Config(format!("unknown tls trust policy {other:?}"))),
            },
        }
    }
}

/// Builds the rustls client configuration for `policy`.
pub fn client_config(policy: &TrustPolicy) -> DoaResult<ClientConfig> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|err| DoaError::Tls(err.to_string()))?;

    let config = match policy {
        TrustPolicy::AcceptAny => {
            warn!("tls: certificate verification disabled (trust policy accept_any)");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyVerifier { provider }))
                .with_no_client_auth()
        }
        TrustPolicy::CaFile(path) => builder
            .with_root_certificates(load_ca_file(path)?)
            .with_no_client_auth(),
        TrustPolicy::WebPki => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    Ok(config)
}

fn load_ca_file(path: &Path) -> DoaResult<RootCertStore> {
    let pem = fs::read(path)
        .map_err(|err| DoaError::Tls(format!("reading CA file {}: {err}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| DoaError::Tls(format!("parsing CA file {}: {err}", path.display())))?;
    if certs.is_empty() {
        return Err(DoaError::Tls(format!(
            "no certificates in CA file {}",
            path.display()
        )));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|err| DoaError::Tls(format!("rejected CA certificate: {err}")))?;
    }
    debug!("tls: loaded {} CA certificate(s) from {}", roots.len(), path.display());
    Ok(roots)
}

#[derive(Debug)]
struct AcceptAnyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
