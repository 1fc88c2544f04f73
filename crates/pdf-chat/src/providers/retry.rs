use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retry number `attempt` (zero-based), capped at [`MAX_BACKOFF`]
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt)).min(MAX_BACKOFF)
}

/// Retry a request with exponential backoff (1s, 2s, 4s, ...)
///
/// Configuration errors (bad credentials, unknown model) are returned immediately.
pub(crate) async fn retry_request<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e @ Error::Config(_)) => return Err(e),
            Err(e) if attempt >= max_retries => return Err(e),
            Err(e) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}; retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
