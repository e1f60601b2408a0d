//! In-process fake IMAP server for integration testing
//!
//! ## Connection lifecycle
//!
//! The server speaks IMAP over implicit TLS (port 993 style), the way
//! providers publish it under `_imaps._tcp` SRV records:
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   TLS handshake (certificate signed by a per-server test CA)
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client issues commands: LIST, SELECT, FETCH, UID FETCH
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! ## Command format
//!
//! Every client command starts with a **tag** (async-imap uses `A0001`,
//! `A0002`, ...). The server echoes the tag in its completion response;
//! lines prefixed with `*` are untagged data sent before it:
//!
//! ```text
//!   Client:  A0002 LIST "" "%"
//!   Server:  * LIST (\HasNoChildren) "/" "INBOX"
//!   Server:  A0002 OK LIST completed
//! ```

use super::handlers::{handle_fetch, handle_list, handle_login, handle_logout, handle_select};
use super::io::{reply, send};
use super::mailbox::Mailbox;
use crate::test_ca::TestCa;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rustls::pki_types::CertificateDer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Failures the server can be told to produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Answer LOGOUT with `NO`.
    pub logout: bool,
    /// Answer any FETCH asking for BODYSTRUCTURE with `NO`.
    pub bodystructure: bool,
}

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port.
///
/// Mailbox state is shared across connections, so flags changed by one
/// operation are visible to the next, as on a real server.
pub struct FakeImapServer {
    port: u16,
    ca: TestCa,
    mailbox: Arc<Mutex<Mailbox>>,
    connections: Arc<AtomicUsize>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a server holding `mailbox`.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_with_faults(mailbox, Faults::default()).await
    }

    /// Start a server whose LOGOUT always fails.
    pub async fn start_failing_logout(mailbox: Mailbox) -> Self {
        let faults = Faults {
            logout: true,
            ..Faults::default()
        };
        Self::start_with_faults(mailbox, faults).await
    }

    pub async fn start_with_faults(mailbox: Mailbox, faults: Faults) -> Self {
        let ca = TestCa::generate();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = ca.acceptor();
        let mailbox = Arc::new(Mutex::new(mailbox));
        let connections = Arc::new(AtomicUsize::new(0));

        let shared = mailbox.clone();
        let counter = connections.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let acceptor = acceptor.clone();
                let mailbox = shared.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &mailbox, faults).await;
                });
            }
        });

        Self {
            port,
            ca,
            mailbox,
            connections,
            _handle: handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `127.0.0.1:<port>`
    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// The CA that signed the server certificate.
    pub fn ca_der(&self) -> CertificateDer<'static> {
        self.ca.ca_der()
    }

    pub fn ca_pem(&self) -> &str {
        self.ca.ca_pem()
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// A copy of the current mailbox state.
    pub fn snapshot(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    acceptor: TlsAcceptor,
    mailbox: &Mutex<Mailbox>,
    faults: Faults,
) {
    let Ok(tls_stream) = acceptor.accept(stream).await else {
        return;
    };
    let mut reader = BufReader::new(tls_stream);

    // RFC 3501 Section 7.1.1: Server greeting
    if send(&mut reader, b"* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    handle_imap_session(reader, mailbox, faults).await;
}

/// Extract the folder name from a parsed `imap_types::Mailbox`.
fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Run the IMAP command loop over an established stream.
///
/// Each line is parsed with `imap-codec`'s `CommandCodec` and
/// dispatched on its `CommandBody`. Commands other than LOGIN are
/// refused until the client has authenticated.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    mailbox: &Mutex<Mailbox>,
    faults: Faults,
) {
    let mut authenticated = false;
    let mut selected_folder: Option<String> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            if reply(&mut reader, tag, "BAD", "Parse error").await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        match command.body {
            CommandBody::Login { .. } => {
                authenticated = handle_login(tag, &line, &mut reader).await;
            }
            CommandBody::Logout => {
                handle_logout(tag, faults.logout, &mut reader).await;
                break;
            }
            _ if !authenticated => {
                if reply(&mut reader, tag, "NO", "Not authenticated").await.is_err() {
                    break;
                }
            }
            CommandBody::List { .. } => {
                let snap = mailbox.lock().unwrap().clone();
                handle_list(tag, trimmed.ends_with('%'), &snap, &mut reader).await;
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let snap = mailbox.lock().unwrap().clone();
                selected_folder =
                    handle_select(tag, &mailbox_name(&mb), &snap, &mut reader).await;
            }
            CommandBody::Fetch { .. }
                if faults.bodystructure
                    && trimmed.to_ascii_uppercase().contains("BODYSTRUCTURE") =>
            {
                if reply(&mut reader, tag, "NO", "BODYSTRUCTURE unavailable")
                    .await
                    .is_err()
                {
                    break;
                }
            }
            CommandBody::Fetch {
                ref sequence_set,
                uid,
                ..
            } => {
                handle_fetch(
                    tag,
                    &line,
                    sequence_set,
                    uid,
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            _ => {
                if reply(&mut reader, tag, "BAD", "Unknown command").await.is_err() {
                    break;
                }
            }
        }
    }
}
