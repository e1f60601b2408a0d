//! Email address helpers shared by the IMAP and SMTP sides

use crate::error::{Error, Result};

/// The domain part of an email address: everything after the last `@`.
///
/// # Errors
///
/// Returns [`Error::InvalidAddressFormat`] if the address has no `@`.
pub fn email_domain(email: &str) -> Result<&str> {
    email
        .rfind('@')
        .map(|at| &email[at + 1..])
        .ok_or_else(|| Error::InvalidAddressFormat(email.to_string()))
}
