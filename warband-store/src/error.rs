// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use thiserror::Error;

use crate::path::PathError;

/// Error types for replicated store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached. Recoverable: retry on the next
    /// login or on demand.
    #[error("replicated store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A store round-trip exceeded the caller-supplied bound.
    #[error("store operation timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// A record could not be converted to or from its stored JSON form.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A path segment was malformed.
    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
