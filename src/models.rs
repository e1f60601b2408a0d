//! Request-scoped views of an account, served as JSON.

use serde::{Deserialize, Serialize};

/// All mailboxes of an account, `INBOX` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub mailboxes: Vec<Mailbox>,
}

/// A mailbox and, once fetched, its UIDs and first page of messages.
///
/// `uids` and `messages` are `None` in an account listing and always
/// `Some` (possibly empty) after the mailbox itself was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    /// Every UID in the mailbox, highest first.
    pub uids: Option<Vec<u32>>,
    /// Summaries for the first page of `uids`, same order.
    pub messages: Option<Vec<Message>>,
}

impl Mailbox {
    /// A mailbox known by name only.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uids: None,
            messages: None,
        }
    }
}

/// A message summary, or a full message when `body` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub uid: u32,
    pub seen: bool,
    pub from: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
