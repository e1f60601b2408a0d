//! Plain-text message composition
//!
//! Builds a single-part `text/plain; charset=utf-8` message with a
//! quoted-printable body. Header values are stripped of control
//! characters first, so caller input cannot inject header lines.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use lettre::Address;
use lettre::message::Mailbox;
use ring::rand::{SecureRandom, SystemRandom};

/// Longest encoded word allowed by RFC 2047.
const MAX_ENCODED_WORD_LEN: usize = 75;
const ENCODED_WORD_PREFIX: &str = "=?utf-8?q?";
const ENCODED_WORD_SUFFIX: &str = "?=";

/// A composed message with its SMTP envelope addresses.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: Address,
    pub to: Address,
    pub message_id: String,
    /// The complete RFC 5322 message, CRLF line endings.
    pub bytes: Vec<u8>,
}

/// Remove every Unicode control character.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

fn needs_encoding(value: &str) -> bool {
    value.bytes().any(|b| (b < b' ' || b > b'~') && b != b'\t')
}

fn push_q_encoded(word: &mut String, c: char) {
    let mut buf = [0_u8; 4];
    for &b in c.encode_utf8(&mut buf).as_bytes() {
        match b {
            b' ' => word.push('_'),
            b'!'..=b'~' if b != b'=' && b != b'?' && b != b'_' => word.push(char::from(b)),
            _ => word.push_str(&format!("={b:02X}")),
        }
    }
}

fn q_encoded_len(c: char) -> usize {
    let mut word = String::new();
    push_q_encoded(&mut word, c);
    word.len()
}

/// Encode a header value as RFC 2047 `Q` encoded words when it is not
/// plain printable ASCII. Characters are never split across words.
#[must_use]
pub fn encode_header_value(value: &str) -> String {
    if !needs_encoding(value) {
        return value.to_string();
    }

    let budget = MAX_ENCODED_WORD_LEN - ENCODED_WORD_PREFIX.len() - ENCODED_WORD_SUFFIX.len();
    let mut words = Vec::new();
    let mut current = String::new();
    for c in value.chars() {
        if !current.is_empty() && current.len() + q_encoded_len(c) > budget {
            words.push(std::mem::take(&mut current));
        }
        push_q_encoded(&mut current, c);
    }
    words.push(current);

    words
        .iter()
        .map(|word| format!("{ENCODED_WORD_PREFIX}{word}{ENCODED_WORD_SUFFIX}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A globally unique `<unix.randomhex@domain>` Message-ID.
///
/// # Errors
///
/// Returns [`Error::Randomness`] if the system random source fails.
pub fn message_id(domain: &str, now: DateTime<Utc>) -> Result<String> {
    let mut random = [0_u8; 16];
    SystemRandom::new()
        .fill(&mut random)
        .map_err(|_| Error::Randomness("system random source unavailable".into()))?;
    Ok(format!("<{}.{}@{domain}>", now.timestamp(), hex::encode(random)))
}

/// Render a mailbox for a header. Non-ASCII display names become
/// encoded words so the header stays 7-bit.
fn mailbox_header(mailbox: &Mailbox) -> String {
    match mailbox.name.as_deref() {
        Some(name) if needs_encoding(name) => {
            format!("{} <{}>", encode_header_value(name), mailbox.email)
        }
        _ => mailbox.to_string(),
    }
}

/// Parse an RFC 5322 mailbox such as `Alice <alice@example.com>`.
pub fn parse_mailbox(value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e: lettre::address::AddressError| Error::AddressParse {
            address: value.to_string(),
            reason: e.to_string(),
        })
}

fn quoted_printable_body(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\n', "\r\n");
    let mut encoded = quoted_printable::encode_to_str(normalized);
    if !encoded.ends_with("\r\n") {
        encoded.push_str("\r\n");
    }
    encoded
}

/// Compose a message dated now.
pub fn compose(
    domain: &str,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<OutgoingMessage> {
    compose_at(Utc::now(), domain, from, to, subject, body)
}

/// Compose a message dated `now`; `domain` qualifies the Message-ID.
///
/// # Errors
///
/// Returns [`Error::AddressParse`] for malformed `from`/`to`, and
/// [`Error::Randomness`] if no Message-ID can be generated.
pub fn compose_at(
    now: DateTime<Utc>,
    domain: &str,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<OutgoingMessage> {
    let from = parse_mailbox(&sanitize(from))?;
    let to = parse_mailbox(&sanitize(to))?;
    let subject = sanitize(subject);
    let message_id = message_id(domain, now)?;

    let headers = [
        ("From", mailbox_header(&from)),
        ("To", mailbox_header(&to)),
        ("Subject", encode_header_value(&subject)),
        ("Date", now.format("%a, %d %b %Y %H:%M:%S %z").to_string()),
        ("Message-ID", message_id.clone()),
        ("MIME-Version", "1.0".to_string()),
        ("Content-Type", "text/plain; charset=utf-8".to_string()),
        ("Content-Transfer-Encoding", "quoted-printable".to_string()),
    ];

    let mut message = String::new();
    for (name, value) in &headers {
        message.push_str(name);
        message.push_str(": ");
        message.push_str(value);
        message.push_str("\r\n");
    }
    message.push_str("\r\n");
    message.push_str(&quoted_printable_body(body));

    Ok(OutgoingMessage {
        from: from.email,
        to: to.email,
        message_id,
        bytes: message.into_bytes(),
    })
}
