// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use warband_core::{ClaimClass, FactionId, PlayerId, ReclaimKey, TargetId};

/// Path into the replicated JSON document tree.
///
/// Segments are joined by `/`. The store replicates each path
/// independently; two paths never converge together.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Build a path from validated segments.
    pub fn new<S: AsRef<str>>(segments: &[S]) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }

        for segment in segments {
            validate_segment(segment.as_ref())?;
        }

        let joined = segments
            .iter()
            .map(|segment| segment.as_ref())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self(joined))
    }

    /// Internal constructor for paths assembled from trusted segments.
    fn from_trusted(path: String) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a single segment.
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        validate_segment(segment)?;
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    /// The final path segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether this path lies strictly below the given prefix.
    pub fn is_descendant_of(&self, prefix: &StorePath) -> bool {
        self.0
            .strip_prefix(&prefix.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    // Builders for the persisted layout.

    /// `users/{playerId}` — identity binding record.
    pub fn user(player_id: PlayerId) -> Self {
        Self::from_trusted(format!("users/{player_id}"))
    }

    /// `reclaimIndex/{reclaimKey}` — authoritative session pointer.
    pub fn reclaim_index(key: &ReclaimKey) -> Self {
        Self::from_trusted(format!("reclaimIndex/{}", key.to_hex()))
    }

    /// `factions/{factionId}/roles/{playerId}` — explicit role override.
    pub fn faction_role(faction_id: FactionId, player_id: PlayerId) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/roles/{player_id}"))
    }

    /// `factions/{factionId}/claims/{targetId}/{class}` — active claim slot.
    pub fn claim_slot(faction_id: FactionId, target_id: TargetId, class: ClaimClass) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/claims/{target_id}/{class}"))
    }

    /// `factions/{factionId}/pendingTokens/{playerId}` — verification
    /// handshake token.
    pub fn pending_token(faction_id: FactionId, player_id: PlayerId) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/pendingTokens/{player_id}"))
    }

    /// `factions/{factionId}/notes/{targetId}` — shared target note.
    pub fn note(faction_id: FactionId, target_id: TargetId) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/notes/{target_id}"))
    }

    /// Scope prefix covering every claim record of a faction.
    pub fn claims_scope(faction_id: FactionId) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/claims"))
    }

    /// Scope prefix covering every note record of a faction.
    pub fn notes_scope(faction_id: FactionId) -> Self {
        Self::from_trusted(format!("factions/{faction_id}/notes"))
    }
}

impl FromStr for StorePath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.split('/').collect();
        Self::new(&segments)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }

    if segment
        .chars()
        .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']'))
    {
        return Err(PathError::InvalidSegment(segment.to_owned()));
    }

    Ok(())
}

/// Error types for store paths.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    /// A path needs at least one segment.
    #[error("store path needs at least one segment")]
    Empty,

    /// Segments must be non-empty.
    #[error("empty store path segment")]
    EmptySegment,

    /// Segment contains a character the document tree cannot address.
    #[error("invalid store path segment: {0:?}")]
    InvalidSegment(String),
}
