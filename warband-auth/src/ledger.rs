// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared ledger of active target claims.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use warband_core::{Claim, ClaimKind, FactionId, PlayerId, Session, SessionId, TargetId, Timestamp};
use warband_store::{
    CasOutcome, ReplicatedStore, StoreError, StorePath, get_record, set_record, with_timeout,
};

use crate::access::{AccessError, Permission, Role, require_permission};
use crate::events::{CoordinationEvent, EventSender};

/// Shared note attached to a target within the faction scope.
///
/// Notes are owned records like claims: reconciliation rewrites their owner
/// when the writing player re-authenticates under a new session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub owner: PlayerId,
    pub session_id: SessionId,
    pub body: String,
    pub updated_at: Timestamp,
}

/// Bounded retries for the claim compare-and-swap loop. The tie-break is a
/// fixed total order, so contention cannot livelock; the bound only guards
/// against a pathological writer rewriting the slot in a tight loop.
const CLAIM_ATTEMPTS: usize = 3;

/// Maintains the set of active claims and enforces one active claim per
/// target and exclusivity class.
///
/// The store gives no ordering between different writers, so the ledger
/// layers its own discipline on top: every mutation of a claim slot goes
/// through a read-verify-swap sequence, and two writers who both believed
/// the slot free are resolved by a deterministic tie-break — the earlier
/// `claimed_at` wins, the loser's write is rolled back and the loser is
/// told who holds the slot. This is a soft ordering guarantee, not
/// linearizability; it is exactly as strong as the per-path conditional
/// write underneath it.
#[derive(Clone, Debug)]
pub struct ClaimLedger<S> {
    store: S,
    events: EventSender,
    timeout: Duration,
}

impl<S> ClaimLedger<S>
where
    S: ReplicatedStore + Sync,
{
    pub fn new(store: S, events: EventSender, timeout: Duration) -> Self {
        Self {
            store,
            events,
            timeout,
        }
    }

    fn claim_permission(kind: ClaimKind) -> Permission {
        match kind {
            ClaimKind::Attack => Permission::ClaimAttack,
            ClaimKind::MedDeal => Permission::ClaimMedDeal,
            ClaimKind::Farm => Permission::ClaimFarm,
            ClaimKind::Dib => Permission::ClaimDib,
        }
    }

    /// Claim a target, stamping the claim with the current wall clock.
    pub async fn claim(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
        kind: ClaimKind,
        session: &Session,
        role: Role,
    ) -> Result<Claim, ClaimError> {
        self.claim_at(faction_id, target_id, kind, session, role, Timestamp::now())
            .await
    }

    /// Claim a target with an explicit client-assigned `claimed_at`.
    ///
    /// The timestamp is the race comparator: between two contending
    /// writers the earlier one wins, regardless of whose write reached the
    /// store first.
    pub async fn claim_at(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
        kind: ClaimKind,
        session: &Session,
        role: Role,
        claimed_at: Timestamp,
    ) -> Result<Claim, ClaimError> {
        require_permission(role, Self::claim_permission(kind))?;

        let candidate = Claim::new_active(
            target_id,
            session.bound_player_id,
            session.session_id.clone(),
            claimed_at,
            kind,
        );
        let slot = StorePath::claim_slot(faction_id, target_id, kind.class());

        for _ in 0..CLAIM_ATTEMPTS {
            let current = with_timeout(self.timeout, self.store.get(&slot)).await?;
            let occupant = current.as_ref().and_then(|value| parse_claim(&slot, value));

            if let Some(occupant) = occupant.filter(|occupant| occupant.is_active()) {
                if !candidate.wins_over(&occupant) {
                    self.events.emit(CoordinationEvent::TargetAlreadyClaimed {
                        target_id,
                        holder: occupant.claimed_by,
                    });
                    return Err(ClaimError::AlreadyClaimed {
                        holder: occupant.claimed_by,
                    });
                }

                // The occupant wrote later and loses the tie-break; its
                // write is rolled back by the swap below.
                debug!(
                    %target_id,
                    loser = %occupant.claimed_by,
                    winner = %candidate.claimed_by,
                    "rolling back losing claim"
                );
            }

            let new = serde_json::to_value(&candidate).map_err(StoreError::from)?;
            let outcome = with_timeout(
                self.timeout,
                self.store.compare_and_swap(&slot, current.as_ref(), new),
            )
            .await?;

            match outcome {
                CasOutcome::Committed => {
                    self.events.emit(CoordinationEvent::TargetClaimed {
                        target_id,
                        claim: candidate.clone(),
                    });
                    return Ok(candidate);
                }
                // Another writer landed between read and swap; re-evaluate
                // against what is there now.
                CasOutcome::Conflict(_) => continue,
            }
        }

        let holder = self
            .active_occupant(&slot)
            .await?
            .map(|occupant| occupant.claimed_by)
            .unwrap_or(candidate.claimed_by);
        self.events
            .emit(CoordinationEvent::TargetAlreadyClaimed { target_id, holder });
        Err(ClaimError::AlreadyClaimed { holder })
    }

    /// Release the caller's own claim on a target.
    pub async fn release(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
        kind: ClaimKind,
        requesting_player: PlayerId,
    ) -> Result<(), ClaimError> {
        let slot = StorePath::claim_slot(faction_id, target_id, kind.class());
        let occupant = self.active_occupant(&slot).await?.ok_or(ClaimError::NotFound)?;

        if occupant.claimed_by != requesting_player {
            return Err(ClaimError::NotOwner {
                holder: occupant.claimed_by,
            });
        }

        with_timeout(
            self.timeout,
            set_record(&self.store, &slot, &occupant.released()),
        )
        .await?;
        self.events
            .emit(CoordinationEvent::TargetReleased { target_id });
        Ok(())
    }

    /// Release any claim on a target, regardless of owner.
    pub async fn override_release(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
        kind: ClaimKind,
        requesting_player: PlayerId,
        role: Role,
    ) -> Result<(), ClaimError> {
        require_permission(role, Permission::ReleaseAny)?;

        let slot = StorePath::claim_slot(faction_id, target_id, kind.class());
        let occupant = self.active_occupant(&slot).await?.ok_or(ClaimError::NotFound)?;

        debug!(
            %target_id,
            owner = %occupant.claimed_by,
            released_by = %requesting_player,
            "override release"
        );

        with_timeout(
            self.timeout,
            set_record(&self.store, &slot, &occupant.released()),
        )
        .await?;
        self.events
            .emit(CoordinationEvent::TargetReleased { target_id });
        Ok(())
    }

    /// All active claims in the faction scope, oldest first. Read-only and
    /// ungated.
    pub async fn list_active(
        &self,
        faction_id: FactionId,
        filter: Option<ClaimKind>,
    ) -> Result<Vec<Claim>, ClaimError> {
        let scope = StorePath::claims_scope(faction_id);
        let records = with_timeout(self.timeout, self.store.list(&scope)).await?;

        let mut claims: Vec<Claim> = records
            .iter()
            .filter_map(|(path, value)| parse_claim(path, value))
            .filter(|claim| claim.is_active())
            .filter(|claim| filter.is_none_or(|kind| claim.kind == kind))
            .collect();

        claims.sort_by_key(|claim| (claim.claimed_at, claim.claimed_by));
        Ok(claims)
    }

    /// Write or overwrite the shared note on a target.
    ///
    /// Overwriting another player's note needs the note-management
    /// permission on top of the plain write permission.
    pub async fn set_note(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
        body: String,
        session: &Session,
        role: Role,
    ) -> Result<NoteRecord, ClaimError> {
        require_permission(role, Permission::WriteNotes)?;

        let path = StorePath::note(faction_id, target_id);
        let existing: Option<NoteRecord> =
            with_timeout(self.timeout, get_record(&self.store, &path)).await?;

        if let Some(existing) = existing
            && existing.owner != session.bound_player_id
        {
            require_permission(role, Permission::ManageNotes)?;
        }

        let note = NoteRecord {
            owner: session.bound_player_id,
            session_id: session.session_id.clone(),
            body,
            updated_at: Timestamp::now(),
        };
        with_timeout(self.timeout, set_record(&self.store, &path, &note)).await?;
        Ok(note)
    }

    /// The shared note on a target, if any.
    pub async fn note(
        &self,
        faction_id: FactionId,
        target_id: TargetId,
    ) -> Result<Option<NoteRecord>, ClaimError> {
        let path = StorePath::note(faction_id, target_id);
        let note = with_timeout(self.timeout, get_record(&self.store, &path)).await?;
        Ok(note)
    }

    /// All notes in the faction scope.
    pub async fn list_notes(
        &self,
        faction_id: FactionId,
    ) -> Result<Vec<(TargetId, NoteRecord)>, ClaimError> {
        let scope = StorePath::notes_scope(faction_id);
        let records = with_timeout(self.timeout, self.store.list(&scope)).await?;

        let notes = records
            .iter()
            .filter_map(|(path, value)| {
                let target_id = path.leaf().parse::<u64>().ok()?;
                let note: NoteRecord = serde_json::from_value(value.clone()).ok()?;
                Some((TargetId::new(target_id), note))
            })
            .collect();

        Ok(notes)
    }

    /// Delete released claim records from the faction scope, returning how
    /// many were removed. Active claims are never touched.
    pub async fn prune_released(
        &self,
        faction_id: FactionId,
        role: Role,
    ) -> Result<usize, ClaimError> {
        require_permission(role, Permission::PruneReleased)?;

        let scope = StorePath::claims_scope(faction_id);
        let records = with_timeout(self.timeout, self.store.list(&scope)).await?;

        let mut pruned = 0;
        for (path, value) in records {
            let Some(claim) = parse_claim(&path, &value) else {
                continue;
            };
            if claim.is_active() {
                continue;
            }

            with_timeout(self.timeout, self.store.delete(&path)).await?;
            pruned += 1;
        }

        Ok(pruned)
    }

    async fn active_occupant(&self, slot: &StorePath) -> Result<Option<Claim>, ClaimError> {
        let current = with_timeout(self.timeout, self.store.get(slot)).await?;
        Ok(current
            .as_ref()
            .and_then(|value| parse_claim(slot, value))
            .filter(|claim| claim.is_active()))
    }
}

/// A malformed slot value is treated as vacant rather than wedging the
/// slot forever; the next successful claim overwrites it.
fn parse_claim(path: &StorePath, value: &serde_json::Value) -> Option<Claim> {
    match serde_json::from_value(value.clone()) {
        Ok(claim) => Some(claim),
        Err(error) => {
            warn!(%path, %error, "ignoring malformed claim record");
            None
        }
    }
}

/// Error types for claim ledger operations.
///
/// Every failure is surfaced to the caller as one of these; no claim
/// mutation is ever silently dropped.
#[derive(Error, Debug)]
pub enum ClaimError {
    /// The resolved role lacks the permission for the attempted action.
    #[error(transparent)]
    Permission(#[from] AccessError),

    /// The slot is held by another identity. Recoverable: refresh and try
    /// a different target.
    #[error("target already claimed by player {holder}")]
    AlreadyClaimed { holder: PlayerId },

    /// Only the owning identity may release a claim without the override
    /// permission.
    #[error("claim is held by player {holder}, not the requester")]
    NotOwner { holder: PlayerId },

    /// No active claim exists for the target; usually stale UI state,
    /// recoverable by refreshing the claim list.
    #[error("no active claim found for the target")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}
