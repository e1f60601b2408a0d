//! Short-lived authenticated IMAP sessions
//!
//! A [`MailSession`] is opened for one operation and closed when it
//! ends. Opening discovers the account's IMAP servers, connects to the
//! first one that accepts a TLS connection and logs in.

use crate::address::email_domain;
use crate::config::{Credentials, MailConfig, ServerAddr};
use crate::deadline::within;
use crate::discovery::{Service, ServiceLocator, discover};
use crate::error::{Error, Result};
use crate::tls::{handshake, tls_connector};
use async_imap::Session;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info, warn};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

type ImapClient = async_imap::Client<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// An authenticated IMAP connection owned by a single operation.
pub struct MailSession {
    pub(crate) imap: ImapSession,
    pub(crate) timeout: Duration,
}

impl MailSession {
    /// Discover, connect and log in.
    ///
    /// Uses `config.imap_server` when set, otherwise the `imaps` SRV
    /// records of the account's domain.
    pub async fn open<L: ServiceLocator>(
        credentials: &Credentials,
        config: &MailConfig,
        locator: &L,
    ) -> Result<Self> {
        let candidates = match &config.imap_server {
            Some(server) => vec![server.clone()],
            None => {
                let domain = email_domain(&credentials.email)?;
                within(
                    config.timeout,
                    "IMAP server discovery",
                    discover(locator, Service::Imaps, domain),
                )
                .await?
            }
        };

        let connector = tls_connector(&config.extra_roots)?;
        let client = dial_any(&connector, &candidates, config.timeout).await?;

        let imap = within(config.timeout, "IMAP login", async {
            client
                .login(&credentials.email, &credentials.password)
                .await
                .map_err(|(e, _client)| Error::Auth(e.to_string()))
        })
        .await?;

        info!(user = %credentials.email, "Logged in to IMAP server");
        Ok(Self {
            imap,
            timeout: config.timeout,
        })
    }

    /// Log out and release the connection.
    ///
    /// The connection is dropped even if LOGOUT fails; the failure is
    /// still returned.
    pub async fn close(mut self) -> Result<()> {
        let outcome = within(self.timeout, "IMAP logout", async {
            self.imap
                .logout()
                .await
                .map_err(|e| Error::Imap(format!("Logout failed: {e}")))
        })
        .await;
        drop(self.imap);
        debug!("IMAP connection released");
        outcome
    }
}

/// Try each candidate in order and return the first TLS connection.
///
/// Failures are logged and the next candidate is tried; when all fail,
/// the last failure is returned.
async fn dial_any(
    connector: &TlsConnector,
    candidates: &[ServerAddr],
    timeout: Duration,
) -> Result<ImapClient> {
    let mut last_failure = None;

    for server in candidates {
        match dial(connector, server, timeout).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                warn!(
                    host = %server.host,
                    port = server.port,
                    error = %e,
                    "Failed to dial IMAP server"
                );
                last_failure = Some((server, e));
            }
        }
    }

    Err(match last_failure {
        Some((_, e @ Error::Connect { .. })) => e,
        Some((server, e)) => Error::Connect {
            server: server.to_string(),
            reason: e.to_string(),
        },
        None => Error::Discovery {
            service: Service::Imaps.to_string(),
            reason: "no candidates".into(),
        },
    })
}

async fn dial(
    connector: &TlsConnector,
    server: &ServerAddr,
    timeout: Duration,
) -> Result<ImapClient> {
    if server.host.is_empty() {
        return Err(Error::NoSuchServer);
    }
    debug!("Connecting to IMAP server at {}", server);

    let tcp = within(timeout, "TCP connect", async {
        TcpStream::connect((server.host.as_str(), server.port))
            .await
            .map_err(|e| Error::Connect {
                server: server.to_string(),
                reason: e.to_string(),
            })
    })
    .await?;

    let tls_stream = within(
        timeout,
        "TLS handshake",
        handshake(connector, &server.host, tcp),
    )
    .await?;

    Ok(async_imap::Client::new(tls_stream.compat()))
}
