// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces and implementations of the replicated persistence layer the
//! warband coordination stack runs on.
//!
//! The backing store is a path-addressed JSON document tree replicated with
//! eventual consistency: every path converges independently, concurrent
//! writers to the same path resolve last-write-wins, and there are **no
//! transactions across paths**. Multi-path writes in this stack are
//! deliberately modelled as sagas whose compensating step is idempotent
//! re-entry, never as atomic units the store cannot provide.
//!
//! The one concession the store does make is a per-path conditional write
//! ([`CasOutcome`]): a single path can be swapped against an expected prior
//! value. The claim ledger builds its race tie-break on exactly this
//! primitive and nothing stronger.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! simulations. Production deployments implement [`ReplicatedStore`] for
//! their remote store client; every consumer in the stack is generic over
//! the trait.
mod error;
mod memory;
mod path;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod timeout;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use path::{PathError, StorePath};
pub use timeout::with_timeout;
pub use traits::{CasOutcome, LocalReplicatedStore, ReplicatedStore, get_record, set_record};
