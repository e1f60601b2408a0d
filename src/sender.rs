//! Outbound delivery with submission-server failover

use crate::address::email_domain;
use crate::compose::{OutgoingMessage, compose};
use crate::config::{Credentials, MailConfig, ServerAddr};
use crate::deadline::within;
use crate::discovery::{Service, ServiceLocator, discover};
use crate::error::{Error, Result};
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials as SmtpCredentials, Mechanism};
use lettre::transport::smtp::client::{Certificate, Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info, warn};

/// Compose a plain-text message and submit it.
///
/// The message is composed before any network activity, so malformed
/// addresses fail without a DNS lookup. Without an SMTP server override
/// the `submissions` SRV records of the account's domain are tried in
/// order until one accepts the message.
pub async fn send<L: ServiceLocator>(
    credentials: &Credentials,
    config: &MailConfig,
    locator: &L,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let domain = email_domain(&credentials.email)?;
    let message = compose(domain, from, to, subject, body)?;
    debug!(message_id = %message.message_id, "Composed outgoing message");

    let candidates = match &config.smtp_server {
        Some(server) => vec![server.clone()],
        None => {
            within(
                config.timeout,
                "SMTP server discovery",
                discover(locator, Service::Submissions, domain),
            )
            .await?
        }
    };

    deliver_any(credentials, config, &candidates, &message).await
}

async fn deliver_any(
    credentials: &Credentials,
    config: &MailConfig,
    candidates: &[ServerAddr],
    message: &OutgoingMessage,
) -> Result<()> {
    let mut last_failure = None;

    for server in candidates {
        match deliver(credentials, config, server, message).await {
            Ok(()) => {
                info!(host = %server.host, port = server.port, "Message submitted");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    host = %server.host,
                    port = server.port,
                    error = %e,
                    "Failed to deliver message"
                );
                last_failure = Some(e);
            }
        }
    }

    Err(Error::Delivery(Box::new(last_failure.unwrap_or_else(
        || Error::Discovery {
            service: Service::Submissions.to_string(),
            reason: "no candidates".into(),
        },
    ))))
}

/// Submit to one server over implicit TLS with SASL PLAIN.
async fn deliver(
    credentials: &Credentials,
    config: &MailConfig,
    server: &ServerAddr,
    message: &OutgoingMessage,
) -> Result<()> {
    if server.host.is_empty() {
        return Err(Error::NoSuchServer);
    }
    debug!("Submitting to {}", server);

    let mut tls = TlsParameters::builder(server.host.clone());
    for root in &config.extra_roots {
        let certificate = Certificate::from_der(root.to_vec())
            .map_err(|e| Error::Tls(format!("Invalid root certificate: {e}")))?;
        tls = tls.add_root_certificate(certificate);
    }
    let tls = tls.build().map_err(|e| Error::Tls(e.to_string()))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server.host.as_str())
        .port(server.port)
        .tls(Tls::Wrapper(tls))
        .credentials(SmtpCredentials::new(
            credentials.email.clone(),
            credentials.password.clone(),
        ))
        .authentication(vec![Mechanism::Plain])
        .timeout(Some(config.timeout))
        .build();

    let envelope = Envelope::new(Some(message.from.clone()), vec![message.to.clone()])
        .map_err(|e| Error::Smtp(e.to_string()))?;

    within(config.timeout, "SMTP delivery", async {
        transport
            .send_raw(&envelope, &message.bytes)
            .await
            .map(drop)
            .map_err(|e| Error::Smtp(e.to_string()))
    })
    .await
}
