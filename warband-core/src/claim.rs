// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::{PlayerId, SessionId, TargetId};
use crate::time::Timestamp;

/// The kind of intent a claim asserts against a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimKind {
    Attack,
    MedDeal,
    Farm,
    Dib,
}

impl ClaimKind {
    /// The exclusivity class of this claim kind.
    ///
    /// `Attack` and `Dib` both assert exclusive intent to hit the target
    /// and therefore contend for the same slot; medical deals and farming
    /// are independent of each other and of offensive claims.
    pub fn class(&self) -> ClaimClass {
        match self {
            ClaimKind::Attack | ClaimKind::Dib => ClaimClass::Offense,
            ClaimKind::MedDeal => ClaimClass::MedDeal,
            ClaimKind::Farm => ClaimClass::Farm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::Attack => "attack",
            ClaimKind::MedDeal => "medDeal",
            ClaimKind::Farm => "farm",
            ClaimKind::Dib => "dib",
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exclusivity class: at most one active claim exists per target and class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimClass {
    Offense,
    MedDeal,
    Farm,
}

impl ClaimClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimClass::Offense => "offense",
            ClaimClass::MedDeal => "medDeal",
            ClaimClass::Farm => "farm",
        }
    }
}

impl fmt::Display for ClaimClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimStatus {
    Active,
    Released,
}

/// Exclusive, role-gated assertion of intent to act on a target.
///
/// A claim is owned by the claiming player identity, not by the session it
/// was written under; the session id is carried so identity reconciliation
/// can migrate ownership when the same player re-authenticates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub target_id: TargetId,
    pub claimed_by: PlayerId,
    pub session_id: SessionId,
    pub claimed_at: Timestamp,
    pub kind: ClaimKind,
    pub status: ClaimStatus,
}

impl Claim {
    pub fn new_active(
        target_id: TargetId,
        claimed_by: PlayerId,
        session_id: SessionId,
        claimed_at: Timestamp,
        kind: ClaimKind,
    ) -> Self {
        Self {
            target_id,
            claimed_by,
            session_id,
            claimed_at,
            kind,
            status: ClaimStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ClaimStatus::Active
    }

    /// Consume the claim, forcing its status to released.
    pub fn released(mut self) -> Self {
        self.status = ClaimStatus::Released;
        self
    }

    /// Deterministic race comparator between two claims contending for the
    /// same slot: the earlier `claimed_at` wins, equal timestamps fall back
    /// to the lower player id so every replica picks the same winner.
    ///
    /// Returns `false` for two claims by the same player at the same
    /// instant; neither strictly wins and the occupant stands.
    pub fn wins_over(&self, other: &Claim) -> bool {
        match self.claimed_at.cmp(&other.claimed_at) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.claimed_by < other.claimed_by,
        }
    }
}
