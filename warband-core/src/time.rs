// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Millisecond Unix-epoch timestamp, assigned client-side at write time.
///
/// The replicated store gives no ordering between writers, so timestamps
/// like these are the comparator the coordination protocol layers on top.
/// They are a soft ordering discipline, not a clock-synchronisation claim.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// A clock set before the epoch yields zero rather than failing; claim
    /// tie-breaks only need the comparator to be total.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
