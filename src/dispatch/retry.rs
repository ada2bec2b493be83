use std::{future::Future, time::Duration};

use super::DispatchError;

/// Runs `op` up to `attempts` times, sleeping `backoff` between tries.
///
/// Only errors for which [`DispatchError::is_retryable`] holds are retried.
pub async fn with_backoff<T, F, Fut>(
    attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, DispatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && e.is_retryable() => {
                tracing::debug!(attempt, error = %e, "transport attempt failed, backing off");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
