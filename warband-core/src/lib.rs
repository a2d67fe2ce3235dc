// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types for the warband faction coordination stack.
//!
//! This crate holds the small, dependency-light types every other warband
//! crate builds on: stable player and faction identifiers, the ephemeral
//! authentication [`Session`], the derived [`ReclaimKey`] which recognises
//! the same durable player across distinct sessions, and the [`Claim`]
//! record with its deterministic race tie-break.
//!
//! All persisted records serialise as camel-cased JSON, matching the layout
//! of the replicated document tree they are stored in.
pub mod claim;
pub mod hash;
pub mod identity;
pub mod time;

pub use claim::{Claim, ClaimClass, ClaimKind, ClaimStatus};
pub use hash::{HASH_LEN, Hash, HashError};
pub use identity::{
    FINGERPRINT_PREFIX_LEN, FactionId, PlayerId, PlayerIdentity, ReclaimKey, Session, SessionId,
    TargetId,
};
pub use time::Timestamp;
