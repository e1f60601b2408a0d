//! Error types for tinymail

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid email address format: {0}")]
    InvalidAddressFormat(String),

    #[error("invalid address {address:?}: {reason}")]
    AddressParse { address: String, reason: String },

    #[error("invalid UID: {0}")]
    InvalidUid(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("service discovery failed for {service}: {reason}")]
    Discovery { service: String, reason: String },

    #[error("SRV record does not name a server")]
    NoSuchServer,

    #[error("failed to connect to {server}: {reason}")]
    Connect { server: String, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("login failed: {0}")]
    Auth(String),

    #[error("failed to select {mailbox}: {reason}")]
    MailboxSelect { mailbox: String, reason: String },

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("failed to fetch body structure: {0}")]
    BodyStructureFetch(String),

    #[error("message not found: UID {0}")]
    MessageNotFound(u32),

    #[error("failed to decode message part: {0}")]
    Decode(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("randomness source failed: {0}")]
    Randomness(String),

    #[error("delivery failed on every candidate, last error: {0}")]
    Delivery(Box<Error>),

    #[error("logout failed: {0}")]
    Teardown(Box<Error>),

    #[error("{primary}; additionally logout failed: {teardown}")]
    Joined {
        primary: Box<Error>,
        teardown: Box<Error>,
    },
}

impl Error {
    /// Combine an operation's outcome with the outcome of closing its
    /// session. Neither error is dropped.
    pub fn join<T>(outcome: Result<T>, teardown: Result<()>) -> Result<T> {
        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(teardown)) => Err(Self::Teardown(Box::new(teardown))),
            (Err(primary), Ok(())) => Err(primary),
            (Err(primary), Err(teardown)) => Err(Self::Joined {
                primary: Box::new(primary),
                teardown: Box::new(teardown),
            }),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
