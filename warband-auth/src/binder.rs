// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binding an ephemeral authentication session to a durable player
//! identity.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use warband_core::{FactionId, Hash, PlayerIdentity, ReclaimKey, Session, SessionId, Timestamp};
use warband_store::{ReplicatedStore, StoreError, StorePath, get_record, set_record, with_timeout};

/// Record at `users/{playerId}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub faction_id: FactionId,
    pub reclaim_key: ReclaimKey,
    pub updated_at: Timestamp,
}

/// Record at `reclaimIndex/{reclaimKey}`: the currently-authoritative
/// session for a reclaim key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimRecord {
    pub session_id: SessionId,
    pub updated_at: Timestamp,
}

/// Record at `factions/{factionId}/pendingTokens/{playerId}`, consumed by
/// the out-of-band verification handshake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTokenRecord {
    pub token: String,
    pub issued_at: Timestamp,
}

/// What a successful bind established.
#[derive(Clone, Debug, PartialEq)]
pub struct BindOutcome {
    pub reclaim_key: ReclaimKey,

    /// The session the reclaim index pointed at before this bind, when it
    /// differs from the bound session. Evidence that the same durable
    /// identity re-authenticated; input to reconciliation.
    pub previous_session: Option<SessionId>,
}

/// Binds a session to a player identity and persists the binding.
///
/// The binding spans three independent store paths with no atomicity
/// between them; `bind` is written to be re-runnable, and a partially
/// persisted binding is healed by the next successful bind or
/// reconciliation rather than treated as an error state.
#[derive(Clone, Debug)]
pub struct SessionIdentityBinder<S> {
    store: S,
    timeout: Duration,
}

impl<S> SessionIdentityBinder<S>
where
    S: ReplicatedStore + Sync,
{
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Bind the session to the player identity under a derived reclaim
    /// key.
    ///
    /// The reclaim index is only written here when the key was previously
    /// vacant. An index already pointing at a *different* session is
    /// evidence for ownership migration and is left untouched for the
    /// reconciler, which owns the pointer hand-over.
    pub async fn bind(
        &self,
        session: &Session,
        identity: &PlayerIdentity,
        credential_fingerprint: &str,
    ) -> Result<BindOutcome, BinderError> {
        let faction_id = identity.faction_id.ok_or(BinderError::MissingFaction)?;
        let reclaim_key = ReclaimKey::derive(faction_id, credential_fingerprint);
        let now = Timestamp::now();

        let user_record = UserRecord {
            faction_id,
            reclaim_key,
            updated_at: now,
        };
        with_timeout(
            self.timeout,
            set_record(&self.store, &StorePath::user(identity.player_id), &user_record),
        )
        .await?;

        let index_path = StorePath::reclaim_index(&reclaim_key);
        let current: Option<ReclaimRecord> =
            with_timeout(self.timeout, get_record(&self.store, &index_path)).await?;

        let previous_session = match current {
            None => {
                let record = ReclaimRecord {
                    session_id: session.session_id.clone(),
                    updated_at: now,
                };
                with_timeout(self.timeout, set_record(&self.store, &index_path, &record)).await?;
                None
            }
            Some(record) if record.session_id == session.session_id => None,
            Some(record) => Some(record.session_id),
        };

        // Derived rather than freshly random: re-running a partially failed
        // bind writes the identical token.
        let token_record = PendingTokenRecord {
            token: Hash::new(format!("{}:{}", session.session_id, reclaim_key.to_hex())).to_hex(),
            issued_at: now,
        };
        with_timeout(
            self.timeout,
            set_record(
                &self.store,
                &StorePath::pending_token(faction_id, identity.player_id),
                &token_record,
            ),
        )
        .await?;

        debug!(
            player = %identity.player_id,
            faction = %faction_id,
            key = %reclaim_key,
            superseding = previous_session.is_some(),
            "bound session to identity"
        );

        Ok(BindOutcome {
            reclaim_key,
            previous_session,
        })
    }
}

/// Error types for session identity binding.
#[derive(Error, Debug)]
pub enum BinderError {
    /// The store could not be reached while persisting the binding.
    ///
    /// Callers treat the session as functional for read-only operations
    /// but must deny claim-mutating operations until a bind succeeds.
    #[error("identity binding unavailable: {0}")]
    IdentityBindingUnavailable(#[from] StoreError),

    /// Reclaim binding is derived from the faction; a player without one
    /// cannot be bound.
    #[error("player has no faction; reclaim binding requires faction membership")]
    MissingFaction,
}
