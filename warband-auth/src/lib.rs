// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity reconciliation, role resolution and target-claim coordination
//! for faction tooling.
//!
//! The stack sits between an ephemeral authentication session and a
//! replicated store with only per-path eventual consistency, and keeps
//! three promises the store itself cannot:
//!
//! - one durable player identity per reclaim key, with ownership of
//!   previously written records migrated when the player re-authenticates
//!   under a new session ([`reconciler`]);
//! - one effective permission role resolved deterministically from several,
//!   sometimes conflicting, identity signals ([`resolver`], [`access`]);
//! - at most one active claim per target and exclusivity class, maintained
//!   by a deterministic tie-break between racing writers ([`ledger`]).
//!
//! Presentation collaborators talk to [`facade::CoordinationFacade`] only;
//! state changes reach them as [`events::CoordinationEvent`]s.
pub mod access;
pub mod binder;
pub mod events;
pub mod facade;
pub mod ledger;
pub mod reconciler;
pub mod resolver;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
pub mod traits;

pub use access::{AccessError, Permission, Role};
pub use events::CoordinationEvent;
pub use facade::{CoordinationConfig, CoordinationError, CoordinationFacade, Snapshot};
pub use resolver::{RoleSignals, resolve_role};
