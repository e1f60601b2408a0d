//! Webmail client facade

use crate::config::{Credentials, MailConfig};
use crate::discovery::{DnsLocator, ServiceLocator};
use crate::error::{Error, Result};
use crate::models::{Account, Mailbox, Message};
use crate::sender;
use crate::session::MailSession;

/// Per-request mail client for one account.
///
/// Every read operation opens its own IMAP session and closes it before
/// returning, whether the operation succeeded or not. Nothing is cached
/// between calls.
pub struct MailClient<L = DnsLocator> {
    credentials: Credentials,
    config: MailConfig,
    locator: L,
}

impl MailClient {
    /// Build a client that discovers servers through system DNS.
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be
    /// loaded.
    pub fn new(credentials: Credentials, config: MailConfig) -> Result<Self> {
        Ok(Self::with_locator(
            credentials,
            config,
            DnsLocator::from_system()?,
        ))
    }
}

impl<L: ServiceLocator> MailClient<L> {
    /// Build a client with a custom service locator.
    #[must_use]
    pub const fn with_locator(credentials: Credentials, config: MailConfig, locator: L) -> Self {
        Self {
            credentials,
            config,
            locator,
        }
    }

    async fn open(&self) -> Result<MailSession> {
        MailSession::open(&self.credentials, &self.config, &self.locator).await
    }

    /// List the account's top-level mailboxes, `INBOX` first.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery, connection, login or LIST fails.
    pub async fn account(&self) -> Result<Account> {
        let mut session = self.open().await?;
        let outcome = session.account().await;
        Error::join(outcome, session.close().await)
    }

    /// All UIDs of `name`, highest first, with summaries of the first
    /// page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxSelect`] if the mailbox cannot be
    /// selected, or an error from connecting or fetching.
    pub async fn mailbox(&self, name: &str) -> Result<Mailbox> {
        let mut session = self.open().await?;
        let outcome = session.mailbox(name).await;
        Error::join(outcome, session.close().await)
    }

    /// Summaries of exactly `uids` in `mailbox`, highest UID first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUid`] for UID 0 without connecting, and
    /// otherwise the errors of [`Self::mailbox`].
    pub async fn messages(&self, mailbox: &str, uids: &[u32]) -> Result<Vec<Message>> {
        if uids.contains(&0) {
            return Err(Error::InvalidUid(0));
        }
        let mut session = self.open().await?;
        let outcome = session.messages(mailbox, uids).await;
        Error::join(outcome, session.close().await)
    }

    /// One message with the decoded text of its first `text/plain`
    /// part.
    ///
    /// Fetching the part may set `\Seen` on the server, so `seen` can
    /// differ between the first and later calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUid`] for UID 0 without connecting,
    /// [`Error::MessageNotFound`] if `uid` is not in `mailbox`, and
    /// [`Error::Decode`] if the part cannot be decoded.
    pub async fn message(&self, mailbox: &str, uid: u32) -> Result<Message> {
        if uid == 0 {
            return Err(Error::InvalidUid(uid));
        }
        let mut session = self.open().await?;
        let outcome = session.message(mailbox, uid).await;
        Error::join(outcome, session.close().await)
    }

    /// Compose a plain-text message and submit it from this account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParse`] for malformed addresses,
    /// [`Error::Discovery`] if no submission server is published, and
    /// [`Error::Delivery`] if every candidate server failed.
    pub async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        sender::send(
            &self.credentials,
            &self.config,
            &self.locator,
            from,
            to,
            subject,
            body,
        )
        .await
    }
}
