//! TLS client setup
//!
//! Both IMAP and SMTP use implicit TLS. Server certificates are
//! verified against the webpki root set plus any extra roots from
//! [`MailConfig`](crate::MailConfig).

use crate::error::{Error, Result};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, ServerName};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

/// Build a root store of the webpki roots plus `extra_roots`.
pub fn root_store(extra_roots: &[CertificateDer<'static>]) -> Result<RootCertStore> {
    let mut roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    for cert in extra_roots {
        roots
            .add(cert.clone())
            .map_err(|e| Error::Tls(format!("Invalid root certificate: {e}")))?;
    }
    Ok(roots)
}

/// Build a verifying TLS connector using the ring provider.
pub fn tls_connector(extra_roots: &[CertificateDer<'static>]) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_root_certificates(root_store(extra_roots)?)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Perform the TLS handshake for `host` over an open TCP stream.
pub async fn handshake(
    connector: &TlsConnector,
    host: &str,
    tcp: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}
