//! Connection configuration and credentials

use crate::error::{Error, Result};
use rustls::pki_types::CertificateDer;
use std::env;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default per-step network timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Account credentials, supplied by the caller for every operation.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Load credentials from `TINYMAIL_EMAIL` and `TINYMAIL_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            email: env::var("TINYMAIL_EMAIL")
                .map_err(|_| Error::Config("TINYMAIL_EMAIL not set".into()))?,
            password: env::var("TINYMAIL_PASSWORD")
                .map_err(|_| Error::Config("TINYMAIL_PASSWORD not set".into()))?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A `host:port` pair, either configured or discovered via SRV.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Config(format!("expected host:port, got {s:?}")))?;
        if host.is_empty() {
            return Err(Error::Config(format!("missing host in {s:?}")));
        }
        let port = port
            .parse()
            .map_err(|e| Error::Config(format!("invalid port in {s:?}: {e}")))?;
        Ok(Self::new(host, port))
    }
}

/// How the client reaches mail servers.
///
/// Without overrides, IMAP and SMTP servers are discovered through SRV
/// records of the account's domain.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_server: Option<ServerAddr>,
    pub smtp_server: Option<ServerAddr>,
    /// Upper bound for every single network step.
    pub timeout: Duration,
    /// Trusted in addition to the webpki root set.
    pub extra_roots: Vec<CertificateDer<'static>>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            imap_server: None,
            smtp_server: None,
            timeout: DEFAULT_TIMEOUT,
            extra_roots: Vec::new(),
        }
    }
}

impl MailConfig {
    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `TINYMAIL_IMAP_SERVER` (`host:port`, default: SRV discovery)
    /// - `TINYMAIL_SMTP_SERVER` (`host:port`, default: SRV discovery)
    /// - `TINYMAIL_TIMEOUT_SECS` (default: `30`)
    /// - `TINYMAIL_CA_FILE` (PEM bundle of extra trusted roots)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let imap_server = env::var("TINYMAIL_IMAP_SERVER")
            .ok()
            .map(|s| s.parse())
            .transpose()?;
        let smtp_server = env::var("TINYMAIL_SMTP_SERVER")
            .ok()
            .map(|s| s.parse())
            .transpose()?;
        let timeout = env::var("TINYMAIL_TIMEOUT_SECS")
            .ok()
            .map(|s| {
                s.parse()
                    .map(Duration::from_secs)
                    .map_err(|e| Error::Config(format!("Invalid TINYMAIL_TIMEOUT_SECS: {e}")))
            })
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT);
        let extra_roots = match env::var("TINYMAIL_CA_FILE") {
            Ok(path) => load_pem_certificates(Path::new(&path))?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            imap_server,
            smtp_server,
            timeout,
            extra_roots,
        })
    }
}

/// Read every certificate from a PEM file.
pub fn load_pem_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("invalid PEM in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "no certificates in {}",
            path.display()
        )));
    }
    Ok(certs)
}
