//! Per-step network deadlines

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Run `step` to completion or fail with [`Error::Timeout`] after `limit`.
pub async fn within<T, F>(limit: Duration, what: &str, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| Error::Timeout(format!("{what} took longer than {limit:?}")))?
}
