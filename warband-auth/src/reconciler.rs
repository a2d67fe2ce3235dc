// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership migration when a durable identity re-authenticates.
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use warband_core::{Claim, FactionId, ReclaimKey, Session, SessionId, Timestamp};
use warband_store::{ReplicatedStore, StoreError, StorePath, get_record, set_record, with_timeout};

use crate::binder::ReclaimRecord;
use crate::ledger::NoteRecord;

/// Result of a reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationResult {
    /// The reclaim index already named the caller's session, or the key
    /// was vacant and the pointer has now been committed.
    NoOp,

    /// The key was bound to a different session; ownership of that
    /// session's records has been rewritten.
    Migrated {
        from: SessionId,
        to: SessionId,
        claims_rewritten: usize,
        notes_rewritten: usize,
    },
}

/// Migrates record ownership from a superseded session to the current one.
///
/// The store delivers at-least-once and cannot guarantee a migration runs
/// exactly once, so the whole pass is idempotent: re-running it with the
/// same inputs converges to the same end state, which is also what heals a
/// pass that died half-way. Between interruption and the next login a
/// window exists where ownership does not match the live session; records
/// stay traceable throughout because migration only rewrites owner fields
/// and never deletes.
///
/// Scans are scoped to one faction, bounding both the scan cost and the
/// blast radius of a reclaim key collision.
#[derive(Clone, Debug)]
pub struct IdentityReconciler<S> {
    store: S,
    timeout: Duration,
}

impl<S> IdentityReconciler<S>
where
    S: ReplicatedStore + Sync,
{
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Reconcile the reclaim key with the given session, migrating
    /// ownership of the previously bound session's records if there was
    /// one.
    ///
    /// Safe to run concurrently with itself for the same key; there is no
    /// lock to take on the shared store and none is needed, every step is
    /// an idempotent rewrite.
    pub async fn reconcile(
        &self,
        reclaim_key: &ReclaimKey,
        session: &Session,
        faction_id: FactionId,
    ) -> Result<MigrationResult, ReconcilerError> {
        let index_path = StorePath::reclaim_index(reclaim_key);
        let current: Option<ReclaimRecord> =
            with_timeout(self.timeout, get_record(&self.store, &index_path)).await?;

        let old_session = match current {
            Some(record) if record.session_id != session.session_id => record.session_id,
            Some(_) => return Ok(MigrationResult::NoOp),
            None => {
                // First binding for this key: commit the pointer.
                self.commit_pointer(&index_path, session).await?;
                return Ok(MigrationResult::NoOp);
            }
        };

        let claims_rewritten = self
            .migrate_claims(faction_id, &old_session, session)
            .await?;
        let notes_rewritten = self.migrate_notes(faction_id, &old_session, session).await?;

        // The pointer moves last: a pass that dies before this line leaves
        // the old pointer in place and the next login repeats the scan.
        self.commit_pointer(&index_path, session).await?;

        debug!(
            from = %old_session,
            to = %session.session_id,
            faction = %faction_id,
            claims_rewritten,
            notes_rewritten,
            "migrated record ownership"
        );

        Ok(MigrationResult::Migrated {
            from: old_session,
            to: session.session_id.clone(),
            claims_rewritten,
            notes_rewritten,
        })
    }

    async fn migrate_claims(
        &self,
        faction_id: FactionId,
        old_session: &SessionId,
        session: &Session,
    ) -> Result<usize, ReconcilerError> {
        let scope = StorePath::claims_scope(faction_id);
        let records = with_timeout(self.timeout, self.store.list(&scope)).await?;

        let mut rewritten = 0;
        for (path, value) in records {
            let mut claim: Claim = match serde_json::from_value(value) {
                Ok(claim) => claim,
                Err(error) => {
                    warn!(%path, %error, "skipping malformed claim record during migration");
                    continue;
                }
            };

            if claim.session_id != *old_session {
                continue;
            }

            claim.session_id = session.session_id.clone();
            claim.claimed_by = session.bound_player_id;
            with_timeout(self.timeout, set_record(&self.store, &path, &claim)).await?;
            rewritten += 1;
        }

        Ok(rewritten)
    }

    async fn migrate_notes(
        &self,
        faction_id: FactionId,
        old_session: &SessionId,
        session: &Session,
    ) -> Result<usize, ReconcilerError> {
        let scope = StorePath::notes_scope(faction_id);
        let records = with_timeout(self.timeout, self.store.list(&scope)).await?;

        let mut rewritten = 0;
        for (path, value) in records {
            let mut note: NoteRecord = match serde_json::from_value(value) {
                Ok(note) => note,
                Err(error) => {
                    warn!(%path, %error, "skipping malformed note record during migration");
                    continue;
                }
            };

            if note.session_id != *old_session {
                continue;
            }

            note.session_id = session.session_id.clone();
            note.owner = session.bound_player_id;
            with_timeout(self.timeout, set_record(&self.store, &path, &note)).await?;
            rewritten += 1;
        }

        Ok(rewritten)
    }

    async fn commit_pointer(
        &self,
        index_path: &StorePath,
        session: &Session,
    ) -> Result<(), ReconcilerError> {
        let record = ReclaimRecord {
            session_id: session.session_id.clone(),
            updated_at: Timestamp::now(),
        };
        with_timeout(self.timeout, set_record(&self.store, index_path, &record)).await?;
        Ok(())
    }
}

/// Error types for reconciliation.
///
/// A failed pass is never escalated to the user; it logs, and the next
/// successful pass converges to the same end state.
#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("store unavailable during reconciliation: {0}")]
    Store(#[from] StoreError),
}
