//! Retry utilities for transient upload failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::PipelineError;
use rand::Rng;
use std::time::Duration;

/// Determine whether an upload error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx).
/// Non-retryable: auth failures, bad requests, local write errors.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Upload {
            status_code,
            message,
            ..
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            // Connection refused, DNS failure and the like
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Add up to 25% random jitter so concurrent retries spread out.
pub fn with_jitter(delay: Duration) -> Duration {
    let max_extra = delay.as_millis() as u64 / 4;
    if max_extra == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_extra))
}
