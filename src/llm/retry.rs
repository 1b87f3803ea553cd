//! Exponential backoff helper shared by the LLM Client Adapter's connect
//! phase. Grounded on the teacher's `src/llms/providers/xai/mod.rs` retry
//! loop and `src/mcp/client.rs::retry_operation`, generalized to the base
//! 0.5s / cap 4s schedule this crate's spec calls for.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(4);

/// The outcome of a single attempt that failed.
#[derive(Debug, Clone)]
pub struct AttemptError {
    pub retryable: bool,
    pub message: String,
}

impl AttemptError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { retryable: true, message: message.into() }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self { retryable: false, message: message.into() }
    }
}

/// Run `attempt` up to `max_retries + 1` times, doubling the delay between
/// retryable failures starting at 500ms and capping at 4s. A non-retryable
/// failure, or exhausting retries, returns the last error immediately.
pub async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut attempt: F) -> Result<T, AttemptError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut delay = BASE_DELAY;

    for attempt_no in 0..=max_retries {
        match attempt(attempt_no).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let is_last = attempt_no == max_retries;
                if !err.retryable || is_last {
                    return Err(err);
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    unreachable!("loop always returns on the final iteration")
}
