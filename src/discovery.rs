//! SRV-based mail server discovery
//!
//! Mail providers publish their client-facing servers as SRV records
//! (RFC 6186): `_imaps._tcp.<domain>` for IMAP over implicit TLS and
//! `_submissions._tcp.<domain>` for message submission over implicit
//! TLS (RFC 8314). Lookups go through [`ServiceLocator`] so callers can
//! substitute their own resolver.

use crate::config::ServerAddr;
use crate::error::{Error, Result};
use hickory_resolver::TokioResolver;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// A discoverable mail service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// IMAP over implicit TLS.
    Imaps,
    /// Message submission over implicit TLS.
    Submissions,
}

impl Service {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imaps => "imaps",
            Self::Submissions => "submissions",
        }
    }

    /// The SRV owner name for this service under `domain`.
    #[must_use]
    pub fn record_name(self, domain: &str) -> String {
        format!("_{}._tcp.{domain}", self.as_str())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a service under a domain into ordered candidate servers.
pub trait ServiceLocator: Send + Sync {
    /// Candidates in the order they should be tried. An empty target
    /// host means the record exists but names no server.
    fn lookup(
        &self,
        service: Service,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<ServerAddr>>> + Send;
}

/// [`ServiceLocator`] backed by the system DNS configuration.
#[derive(Clone)]
pub struct DnsLocator {
    resolver: TokioResolver,
}

impl DnsLocator {
    /// Build a locator from the system resolver configuration.
    pub fn from_system() -> Result<Self> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| Error::Config(format!("Failed to create resolver: {e}")))?
            .build();
        Ok(Self { resolver })
    }
}

impl ServiceLocator for DnsLocator {
    async fn lookup(&self, service: Service, domain: &str) -> Result<Vec<ServerAddr>> {
        let name = service.record_name(domain);
        debug!("Looking up SRV records for {}", name);

        let lookup = self
            .resolver
            .srv_lookup(name.as_str())
            .await
            .map_err(|e| Error::Discovery {
                service: name.clone(),
                reason: e.to_string(),
            })?;

        let records = lookup
            .iter()
            .map(|srv| SrvRecord {
                priority: srv.priority(),
                weight: srv.weight(),
                target: srv.target().to_string(),
                port: srv.port(),
            })
            .collect();
        Ok(order_records(records))
    }
}

/// One SRV answer, before ordering.
#[derive(Debug, Clone)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub target: String,
    pub port: u16,
}

/// Order SRV answers for connection attempts: lowest priority first,
/// heavier weight first within a priority. The trailing root dot is
/// trimmed, so a `.` target becomes an empty host.
#[must_use]
pub fn order_records(mut records: Vec<SrvRecord>) -> Vec<ServerAddr> {
    records.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.weight.cmp(&a.weight))
    });
    records
        .into_iter()
        .map(|r| ServerAddr::new(r.target.trim_end_matches('.'), r.port))
        .collect()
}

/// Look up `service` and fail unless at least one candidate is found.
pub async fn discover<L: ServiceLocator>(
    locator: &L,
    service: Service,
    domain: &str,
) -> Result<Vec<ServerAddr>> {
    let candidates = locator.lookup(service, domain).await?;
    if candidates.is_empty() {
        return Err(Error::Discovery {
            service: service.record_name(domain),
            reason: "no candidates".into(),
        });
    }
    debug!(
        service = %service,
        domain,
        count = candidates.len(),
        "Discovered candidate servers"
    );
    Ok(candidates)
}
