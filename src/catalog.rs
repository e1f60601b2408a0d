//! Mailbox listing, UID enumeration and message summaries

use crate::deadline::within;
use crate::error::{Error, Result};
use crate::models::{Account, Mailbox, Message};
use crate::session::MailSession;
use async_imap::types::{Fetch, Flag};
use futures::TryStreamExt;
use imap_proto::types::Envelope;
use mail_parser::MessageParser;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Sequence positions covered by one UID enumeration FETCH.
pub const UID_BATCH_SIZE: u32 = 500;

/// Number of summaries returned with a mailbox.
pub const PAGE_SIZE: usize = 25;

pub const INBOX: &str = "INBOX";

/// INBOX is case-insensitive (RFC 3501, section 5.1).
fn is_inbox(name: &str) -> bool {
    name.eq_ignore_ascii_case(INBOX)
}

/// Put `INBOX` first, whether or not the server listed it, and keep
/// every other mailbox in server order.
#[must_use]
pub fn inbox_first<I>(names: I) -> Vec<Mailbox>
where
    I: IntoIterator<Item = String>,
{
    std::iter::once(Mailbox::named(INBOX))
        .chain(
            names
                .into_iter()
                .filter(|name| !is_inbox(name))
                .map(Mailbox::named),
        )
        .collect()
}

/// Mailbox names travel in modified UTF-7 (RFC 3501, section 5.1.3).
#[must_use]
pub fn decode_mailbox_name(wire: &str) -> String {
    utf7_imap::decode_utf7_imap(wire.to_string())
}

#[must_use]
pub fn encode_mailbox_name(name: &str) -> String {
    utf7_imap::encode_utf7_imap(name.to_string())
}

/// Inclusive 1-based sequence ranges covering `count` messages.
#[must_use]
pub fn sequence_batches(count: u32, batch: u32) -> Vec<(u32, u32)> {
    (0..count)
        .step_by(batch as usize)
        .map(|start| (start + 1, count.min(start.saturating_add(batch))))
        .collect()
}

/// A comma-separated IMAP set of UIDs.
#[must_use]
pub fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// The first address of the envelope's From field as `mailbox@host`.
///
/// Empty unless both the mailbox and the host are present.
#[must_use]
pub fn envelope_from(envelope: &Envelope<'_>) -> String {
    let Some(address) = envelope.from.as_ref().and_then(|list| list.first()) else {
        return String::new();
    };
    let text = |part: Option<&std::borrow::Cow<'_, [u8]>>| {
        part.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    };
    let mailbox = text(address.mailbox.as_ref());
    let host = text(address.host.as_ref());
    if mailbox.is_empty() || host.is_empty() {
        return String::new();
    }
    format!("{mailbox}@{host}")
}

/// Decode RFC 2047 encoded words in a raw header value.
#[must_use]
pub fn decode_header_text(raw: &[u8]) -> String {
    let mut header = b"Subject: ".to_vec();
    header.extend_from_slice(raw);
    header.extend_from_slice(b"\r\n\r\n");

    MessageParser::default()
        .parse(&header[..])
        .and_then(|parsed| parsed.subject().map(str::to_owned))
        .unwrap_or_else(|| String::from_utf8_lossy(raw).trim().to_string())
}

/// Build a summary from a FETCH response carrying UID, FLAGS and
/// ENVELOPE. Responses without a UID are skipped.
pub(crate) fn summarize(fetch: &Fetch) -> Option<Message> {
    let uid = fetch.uid?;
    let (from, subject) = fetch.envelope().map_or_else(Default::default, |envelope| {
        (
            envelope_from(envelope),
            envelope
                .subject
                .as_deref()
                .map(decode_header_text)
                .unwrap_or_default(),
        )
    });

    Some(Message {
        uid,
        seen: fetch.flags().any(|flag| matches!(flag, Flag::Seen)),
        from,
        subject,
        body: None,
    })
}

fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.uid.cmp(&a.uid));
}

impl MailSession {
    /// List top-level mailboxes, `INBOX` first.
    pub async fn account(&mut self) -> Result<Account> {
        let names = within(self.timeout, "LIST", async {
            let stream = self
                .imap
                .list(Some(""), Some("%"))
                .await
                .map_err(|e| Error::Imap(format!("List mailboxes failed: {e}")))?;
            stream
                .map_ok(|name| decode_mailbox_name(name.name()))
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| Error::Imap(format!("List mailboxes failed: {e}")))
        })
        .await?;

        debug!("Server listed {} mailboxes", names.len());
        Ok(Account {
            mailboxes: inbox_first(names),
        })
    }

    /// SELECT a mailbox and return its message count.
    pub async fn select(&mut self, mailbox: &str) -> Result<u32> {
        let selected = within(self.timeout, "SELECT", async {
            self.imap
                .select(encode_mailbox_name(mailbox))
                .await
                .map_err(|e| Error::MailboxSelect {
                    mailbox: mailbox.to_string(),
                    reason: e.to_string(),
                })
        })
        .await?;
        Ok(selected.exists)
    }

    /// Every UID of the selected mailbox, highest first.
    ///
    /// UIDs are fetched by sequence range in batches of
    /// [`UID_BATCH_SIZE`]. Duplicates across batches are collapsed.
    pub async fn all_uids(&mut self, count: u32) -> Result<Vec<u32>> {
        let mut uids = BTreeSet::new();

        for (first, last) in sequence_batches(count, UID_BATCH_SIZE) {
            let batch = within(self.timeout, "UID enumeration", async {
                let stream = self
                    .imap
                    .fetch(format!("{first}:{last}"), "UID")
                    .await
                    .map_err(|e| Error::Imap(format!("Fetch {first}:{last} failed: {e}")))?;
                stream
                    .try_filter_map(|fetch| futures::future::ok(fetch.uid))
                    .try_collect::<Vec<_>>()
                    .await
                    .map_err(|e| Error::Imap(format!("Fetch {first}:{last} failed: {e}")))
            })
            .await?;
            uids.extend(batch);
        }

        Ok(uids.into_iter().rev().collect())
    }

    /// Summaries for `uids` in the selected mailbox, highest UID first.
    pub async fn summaries(&mut self, uids: &[u32]) -> Result<Vec<Message>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let set = uid_set(uids);
        let mut messages = within(self.timeout, "summary fetch", async {
            let stream = self
                .imap
                .uid_fetch(&set, "(UID FLAGS ENVELOPE)")
                .await
                .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;
            stream
                .try_filter_map(|fetch| futures::future::ok(summarize(&fetch)))
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| Error::Imap(format!("Fetch error: {e}")))
        })
        .await?;

        sort_newest_first(&mut messages);
        Ok(messages)
    }

    /// SELECT `name` and build its full UID list and first page.
    pub async fn mailbox(&mut self, name: &str) -> Result<Mailbox> {
        let count = self.select(name).await?;
        if count == 0 {
            return Ok(Mailbox {
                name: name.to_string(),
                uids: Some(Vec::new()),
                messages: Some(Vec::new()),
            });
        }

        let uids = self.all_uids(count).await?;
        let page = &uids[..uids.len().min(PAGE_SIZE)];
        info!("Fetching {} of {} messages in {}", page.len(), uids.len(), name);
        let messages = self.summaries(page).await?;

        Ok(Mailbox {
            name: name.to_string(),
            uids: Some(uids),
            messages: Some(messages),
        })
    }

    /// SELECT `mailbox` and fetch summaries for exactly `uids`.
    pub async fn messages(&mut self, mailbox: &str, uids: &[u32]) -> Result<Vec<Message>> {
        self.select(mailbox).await?;
        self.summaries(uids).await
    }
}
