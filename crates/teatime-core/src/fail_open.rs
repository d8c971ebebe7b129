//! Fail-open utilities for graceful degradation
//!
//! Use these for infrastructure operations that should never take the run
//! down with them: screenshot capture, HTML dumps, report writing.
//!
//! DO NOT use fail-open for:
//! - Booking steps (business logic)
//! - Page classification or extraction (correctness)
//! - Authentication (precondition)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open.
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
