//! Throwaway certificate authority for the fake servers
//!
//! Both fake servers speak implicit TLS, so the client verifies a real
//! certificate chain: a CA generated per server with `rcgen`, and a
//! leaf for `127.0.0.1` signed by it. Tests hand the CA to the client
//! as an extra trusted root.

#![allow(dead_code)]

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

pub struct TestCa {
    ca_der: CertificateDer<'static>,
    ca_pem: String,
    acceptor: TlsAcceptor,
}

impl TestCa {
    /// Generate a CA and a `127.0.0.1` server certificate.
    pub fn generate() -> Self {
        // Several tests may race to install it; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut ca_params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "tinymail test CA");
        let ca_key = KeyPair::generate().expect("CA key");
        let ca_cert = ca_params.self_signed(&ca_key).expect("self-sign CA");

        let leaf_params =
            CertificateParams::new(vec!["127.0.0.1".to_string()]).expect("leaf params");
        let leaf_key = KeyPair::generate().expect("leaf key");
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .expect("sign leaf");

        let key_der = PrivatePkcs8KeyDer::from(leaf_key.serialize_der());
        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(
                vec![leaf_cert.der().clone(), ca_cert.der().clone()],
                key_der.into(),
            )
            .expect("build server TLS config");

        Self {
            ca_der: ca_cert.der().clone(),
            ca_pem: ca_cert.pem(),
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
        }
    }

    /// The CA certificate, DER encoded.
    pub fn ca_der(&self) -> CertificateDer<'static> {
        self.ca_der.clone()
    }

    /// The CA certificate, PEM encoded.
    pub fn ca_pem(&self) -> &str {
        &self.ca_pem
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }
}
