//! Readable body resolution
//!
//! A message's BODYSTRUCTURE is walked to find the first `text/plain`
//! part. Only that part is downloaded (its MIME header and its content)
//! and decoded into text.
//!
//! Walk policy:
//!
//! - pre-order, siblings in structural order, first match wins
//! - `message/rfc822` parts (forwarded mail) are never descended into
//! - every other container is descended into

use crate::catalog::{summarize, uid_set};
use crate::deadline::within;
use crate::error::{Error, Result};
use crate::models::Message;
use crate::session::MailSession;
use futures::TryStreamExt;
use imap_proto::types::{BodyStructure, MessageSection, SectionPath};
use mail_parser::MessageParser;
use std::borrow::Cow;
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain";
const MESSAGE_RFC822: &str = "message/rfc822";

/// One node of a message's MIME structure.
///
/// Media types are lower-cased. A `message/rfc822` node has the
/// embedded message's structure as its only child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub media_type: String,
    pub children: Vec<BodyPart>,
}

impl BodyPart {
    #[must_use]
    pub fn leaf(media_type: &str) -> Self {
        Self {
            media_type: media_type.to_ascii_lowercase(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn container(media_type: &str, children: Vec<Self>) -> Self {
        Self {
            media_type: media_type.to_ascii_lowercase(),
            children,
        }
    }

    /// Convert a parsed BODYSTRUCTURE into a `BodyPart` tree.
    #[must_use]
    pub fn from_structure(structure: &BodyStructure<'_>) -> Self {
        match structure {
            BodyStructure::Basic { common, .. } | BodyStructure::Text { common, .. } => {
                Self::leaf(&format!("{}/{}", common.ty.ty, common.ty.subtype))
            }
            BodyStructure::Message { common, body, .. } => Self::container(
                &format!("{}/{}", common.ty.ty, common.ty.subtype),
                vec![Self::from_structure(body)],
            ),
            BodyStructure::Multipart { common, bodies, .. } => Self::container(
                &format!("multipart/{}", common.ty.subtype),
                bodies.iter().map(Self::from_structure).collect(),
            ),
        }
    }

    fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }
}

/// IMAP part path of the first `text/plain` part, if any.
///
/// Paths use IMAP numbering: the children of a multipart root are
/// `[1]`, `[2]`, ...; a single-part message is part `[1]`.
#[must_use]
pub fn find_plain_text(root: &BodyPart) -> Option<Vec<u32>> {
    if root.is_multipart() {
        find_in_children(root, &mut Vec::new())
    } else {
        find_in(root, &mut vec![1])
    }
}

fn find_in(part: &BodyPart, path: &mut Vec<u32>) -> Option<Vec<u32>> {
    if part.media_type == TEXT_PLAIN {
        return Some(path.clone());
    }
    if part.media_type == MESSAGE_RFC822 {
        return None;
    }
    find_in_children(part, path)
}

fn find_in_children(part: &BodyPart, path: &mut Vec<u32>) -> Option<Vec<u32>> {
    for (number, child) in (1..).zip(&part.children) {
        path.push(number);
        if let Some(found) = find_in(child, path) {
            return Some(found);
        }
        path.pop();
    }
    None
}

/// Dotted IMAP section specifier for a part path, e.g. `1.2`.
#[must_use]
pub fn section_spec(path: &[u32]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Decode a part from its MIME header fragment and raw content.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the bytes do not form a parseable
/// MIME entity with text content.
pub fn decode_part(mime_header: &[u8], content: &[u8]) -> Result<String> {
    let mut raw = Vec::with_capacity(mime_header.len() + content.len() + 2);
    if mime_header.is_empty() {
        // No header block: keep the content from being read as headers.
        raw.extend_from_slice(b"\r\n");
    } else {
        raw.extend_from_slice(mime_header);
    }
    raw.extend_from_slice(content);

    let parsed = MessageParser::default()
        .parse(&raw[..])
        .ok_or_else(|| Error::Decode("unparseable MIME part".into()))?;

    parsed
        .body_text(0)
        .or_else(|| parsed.root_part().text_contents().map(Cow::Borrowed))
        .map(Cow::into_owned)
        .ok_or_else(|| Error::Decode("part has no text content".into()))
}

impl MailSession {
    /// The MIME structure of message `uid` in the selected mailbox.
    pub async fn body_structure(&mut self, uid: u32) -> Result<BodyPart> {
        let fetched = within(self.timeout, "BODYSTRUCTURE fetch", async {
            let stream = self
                .imap
                .uid_fetch(uid_set(&[uid]), "(UID BODYSTRUCTURE)")
                .await
                .map_err(|e| Error::BodyStructureFetch(e.to_string()))?;
            stream
                .map_ok(|fetch| fetch.bodystructure().map(BodyPart::from_structure))
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| Error::BodyStructureFetch(e.to_string()))
        })
        .await?;

        if fetched.is_empty() {
            return Err(Error::MessageNotFound(uid));
        }
        fetched
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| Error::BodyStructureFetch(format!("no BODYSTRUCTURE for UID {uid}")))
    }

    /// Fetch and decode one part, together with the message metadata.
    async fn fetch_text_part(&mut self, uid: u32, path: &[u32]) -> Result<Message> {
        let spec = section_spec(path);
        let query = format!("(UID FLAGS ENVELOPE BODY[{spec}.MIME] BODY[{spec}])");
        let mime_path = SectionPath::Part(path.to_vec(), Some(MessageSection::Mime));
        let content_path = SectionPath::Part(path.to_vec(), None);

        let fetched = within(self.timeout, "body part fetch", async {
            let stream = self
                .imap
                .uid_fetch(uid_set(&[uid]), &query)
                .await
                .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;
            stream
                .try_filter_map(|fetch| {
                    let part = summarize(&fetch).map(|summary| {
                        (
                            summary,
                            fetch.section(&mime_path).map(<[u8]>::to_vec).unwrap_or_default(),
                            fetch.section(&content_path).map(<[u8]>::to_vec).unwrap_or_default(),
                        )
                    });
                    futures::future::ok(part)
                })
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| Error::Imap(format!("Fetch error: {e}")))
        })
        .await?;

        let (mut message, mime_header, content) = fetched
            .into_iter()
            .find(|(summary, _, _)| summary.uid == uid)
            .ok_or(Error::MessageNotFound(uid))?;

        message.body = Some(decode_part(&mime_header, &content)?);
        Ok(message)
    }

    /// SELECT `mailbox` and resolve message `uid` with its readable body.
    ///
    /// Messages without a `text/plain` part outside forwarded messages
    /// are returned as a summary without body.
    pub async fn message(&mut self, mailbox: &str, uid: u32) -> Result<Message> {
        self.select(mailbox).await?;

        let structure = self.body_structure(uid).await?;
        if let Some(path) = find_plain_text(&structure) {
            debug!("UID {} has text/plain at part {}", uid, section_spec(&path));
            return self.fetch_text_part(uid, &path).await;
        }

        debug!("UID {} has no text/plain part", uid);
        self.summaries(&[uid])
            .await?
            .into_iter()
            .next()
            .ok_or(Error::MessageNotFound(uid))
    }
}
