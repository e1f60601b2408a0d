//! Minimal webmail engine
//!
//! Per-request access to one mail account: mailbox listing, UID-paged
//! message summaries, the readable body of a single message, and
//! plain-text message submission.
//!
//! IMAP and submission servers are discovered through the account
//! domain's SRV records (RFC 6186) unless configured explicitly. Both
//! protocols use implicit TLS. Every operation opens its own connection
//! and closes it before returning.
//!
//! ```no_run
//! use tinymail::{Credentials, MailClient, MailConfig};
//!
//! # async fn demo() -> tinymail::Result<()> {
//! let client = MailClient::new(
//!     Credentials::new("alice@example.com", "secret"),
//!     MailConfig::default(),
//! )?;
//! let inbox = client.mailbox("INBOX").await?;
//! println!("{} messages", inbox.uids.unwrap_or_default().len());
//! # Ok(())
//! # }
//! ```

mod address;
mod body;
mod catalog;
mod client;
mod compose;
mod config;
mod deadline;
mod discovery;
mod error;
mod models;
mod sender;
mod session;
mod tls;

pub use address::email_domain;
pub use body::{BodyPart, find_plain_text};
pub use catalog::{PAGE_SIZE, UID_BATCH_SIZE};
pub use client::MailClient;
pub use compose::{OutgoingMessage, compose, sanitize};
pub use config::{Credentials, DEFAULT_TIMEOUT, MailConfig, ServerAddr, load_pem_certificates};
pub use discovery::{DnsLocator, Service, ServiceLocator};
pub use error::{Error, Result};
pub use models::{Account, Mailbox, Message};
pub use session::MailSession;
