//! Retry with exponential back-off and jitter for Airtable requests.
//!
//! Airtable allows five requests per second per base and answers bursts with
//! HTTP 429, so rate limiting is treated as transient alongside network
//! failures and 5xx responses.

use std::future::Future;
use std::time::Duration;

use crate::error::AirtableError;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:** timeouts, connection failures, HTTP 5xx, HTTP 429.
///
/// **Not retriable:** not-found, validation, credential and decode errors.
pub(crate) fn is_retriable(err: &AirtableError) -> bool {
    match err {
        AirtableError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        AirtableError::RateLimited { .. } => true,
        AirtableError::UnexpectedStatus { status, .. } => *status >= 500,
        AirtableError::Deserialize { .. }
        | AirtableError::NotFound { .. }
        | AirtableError::Validation(_)
        | AirtableError::Unauthorized { .. }
        | AirtableError::Normalization { .. }
        | AirtableError::PaginationLimit { .. }
        | AirtableError::InvalidBaseUrl { .. } => false,
    }
}

const MAX_DELAY_MS: u64 = 30_000;

/// Stretches a back-off delay to the server's `Retry-After` on a 429,
/// never past [`MAX_DELAY_MS`].
fn honour_retry_after(err: &AirtableError, backoff_ms: u64) -> u64 {
    match err {
        AirtableError::RateLimited { retry_after_secs } => backoff_ms
            .max(retry_after_secs.saturating_mul(1000))
            .min(MAX_DELAY_MS),
        _ => backoff_ms,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The n-th retry sleeps `backoff_base_ms * 2^(n-1)` ms, capped at 30 s, with
/// ±25 % jitter. A 429 waits at least as long as its `Retry-After`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AirtableError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AirtableError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay_ms = honour_retry_after(&err, jittered);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Airtable transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
