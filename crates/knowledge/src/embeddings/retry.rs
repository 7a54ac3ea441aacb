//! Retry with exponential backoff for HTTP embedding providers.

use std::future::Future;
use std::time::Duration;

use sage_core::{AppError, AppResult};
use tracing::warn;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Sleep before the next try after `failures` failed calls: 200ms, 400ms, ...
fn backoff_delay(failures: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(2_u64.saturating_pow(failures)))
}

/// Call `op` up to `attempts` times, sleeping `backoff_delay` between tries.
pub(crate) async fn with_retries<T, F, Fut>(attempts: u32, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    let mut last_error = None;

    while attempt < attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;

                if attempt < attempts {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        attempts,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Embedding("Unknown embedding error".to_string())))
}
