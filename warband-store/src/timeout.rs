// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::error::StoreError;

/// Bound a store round-trip to the caller-supplied limit.
///
/// The calling environment is a single cooperative thread which must never
/// hang on network I/O; every store operation without a bounded round-trip
/// goes through here and fails with [`StoreError::Timeout`] instead of
/// stalling the flow indefinitely.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { limit }),
    }
}
