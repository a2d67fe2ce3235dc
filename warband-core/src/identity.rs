// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::time::Timestamp;

/// Stable player identifier, globally unique, assigned by the external game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Faction identifier assigned by the external game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(u64);

impl FactionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for FactionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a target which can be claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(u64);

impl TargetId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session identifier issued by the identity provider at each
/// authentication. Not stable across logins.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player profile supplied by the external player-data API.
///
/// Read-only input: nothing in this stack owns or mutates it. The position
/// label and faction may change between sessions, the player id never does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub faction_id: Option<FactionId>,
    pub position_label: Option<String>,
    pub display_name: String,
}

/// Ephemeral entity created at each authentication.
///
/// A session is logically destroyed when a newer session for the same
/// reclaim key supersedes it during identity reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub bound_player_id: PlayerId,
    pub bound_faction_id: Option<FactionId>,
    pub created_at: Timestamp,
}

impl Session {
    pub fn new(session_id: SessionId, identity: &PlayerIdentity, created_at: Timestamp) -> Self {
        Self {
            session_id,
            bound_player_id: identity.player_id,
            bound_faction_id: identity.faction_id,
            created_at,
        }
    }
}

/// Number of leading credential fingerprint characters included in reclaim
/// key derivation.
pub const FINGERPRINT_PREFIX_LEN: usize = 16;

/// Deterministic hash joining a faction and a credential fingerprint.
///
/// The reclaim key recognises the same durable player across distinct
/// authentication sessions: two logins computing the same key are treated
/// as the same identity, so collision resistance of the underlying digest
/// is a trust boundary.
///
/// Derivation hashes only a short fingerprint prefix, which bounds entropy.
/// A provider-issued stable subject id would be a stronger join key where
/// available; the prefix scheme is kept because it is what allows
/// cross-device reclaiming with nothing but the credential itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReclaimKey(Hash);

impl ReclaimKey {
    /// Derive the reclaim key for a faction and credential fingerprint.
    pub fn derive(faction_id: FactionId, credential_fingerprint: &str) -> Self {
        let prefix: String = credential_fingerprint
            .chars()
            .take(FINGERPRINT_PREFIX_LEN)
            .collect();
        Self(Hash::new(format!("{faction_id}:{prefix}")))
    }

    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for ReclaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ReclaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReclaimKey({})", &self.to_hex()[..8])
    }
}
