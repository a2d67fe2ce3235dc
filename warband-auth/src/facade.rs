// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single entry point presentation collaborators wire against.
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use warband_core::{
    Claim, ClaimKind, FactionId, PlayerId, PlayerIdentity, ReclaimKey, Session, TargetId, Timestamp,
};
use warband_store::{ReplicatedStore, StoreError, StorePath, get_record, set_record, with_timeout};

use crate::access::{AccessError, Permission, Role, require_permission};
use crate::binder::{BinderError, SessionIdentityBinder};
use crate::events::{CoordinationEvent, EventSender};
use crate::ledger::{ClaimError, ClaimLedger, NoteRecord};
use crate::reconciler::{IdentityReconciler, MigrationResult, ReconcilerError};
use crate::resolver::{RoleSignals, resolve_role};
use crate::traits::{IdentityProvider, PlayerDirectory, SessionToken};

/// Record at `factions/{factionId}/roles/{playerId}`: the explicit role
/// override a leader can set for any member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub role: String,
    pub assigned_by: PlayerId,
    pub updated_at: Timestamp,
}

/// Configuration for the coordination stack.
#[derive(Clone, Debug)]
pub struct CoordinationConfig {
    /// Bound for every store round-trip.
    pub store_timeout: Duration,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,

    /// Players resolved to the developer role ahead of every other signal.
    pub developer_allowlist: HashSet<PlayerId>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(15),
            event_capacity: 64,
            developer_allowlist: HashSet::new(),
        }
    }
}

/// Resolved coordination state, queried by presentation collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub player_id: Option<PlayerId>,
    pub faction_id: Option<FactionId>,
    pub role: Role,
    pub rank: u8,
    pub is_leader_effective: bool,
    pub can_write_leader_ops: bool,
}

impl Snapshot {
    fn for_role(role: Role, player_id: Option<PlayerId>, faction_id: Option<FactionId>) -> Self {
        Self {
            player_id,
            faction_id,
            role,
            rank: role.rank(),
            is_leader_effective: role.is_maximal(),
            can_write_leader_ops: role.has_permission(Permission::WriteLeaderOps),
        }
    }
}

#[derive(Clone, Debug)]
struct SessionState {
    identity: PlayerIdentity,
    session: Session,
    token: SessionToken,
    reclaim_key: Option<ReclaimKey>,
    role: Role,

    /// Whether identity binding succeeded. Claim-mutating operations stay
    /// denied until it has; read-only operations do not care.
    bound: bool,
}

/// Wires binder, reconciler, resolver and ledger into the init, snapshot
/// and event contracts the embedding UI binds to.
///
/// All state lives in this object; the embedding application creates one
/// facade per authenticated session and passes it around explicitly.
#[derive(Debug)]
pub struct CoordinationFacade<S, D, P> {
    store: S,
    directory: D,
    provider: P,
    config: CoordinationConfig,
    events: EventSender,
    binder: SessionIdentityBinder<S>,
    reconciler: IdentityReconciler<S>,
    ledger: ClaimLedger<S>,
    state: Arc<RwLock<Option<SessionState>>>,
}

impl<S, D, P> CoordinationFacade<S, D, P>
where
    S: ReplicatedStore + Sync + 'static,
    D: PlayerDirectory + Sync,
    P: IdentityProvider + Sync,
{
    pub fn new(store: S, directory: D, provider: P, config: CoordinationConfig) -> Self {
        let events = EventSender::new(config.event_capacity);
        Self {
            binder: SessionIdentityBinder::new(store.clone(), config.store_timeout),
            reconciler: IdentityReconciler::new(store.clone(), config.store_timeout),
            ledger: ClaimLedger::new(store.clone(), events.clone(), config.store_timeout),
            store,
            directory,
            provider,
            config,
            events,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Subscribe to coordination events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.events.subscribe()
    }

    /// Establish the session: fetch identity, bind it, reconcile stale
    /// ownership, resolve the effective role and start the live role
    /// watch.
    ///
    /// Identity and binding failures degrade to a read-only session with a
    /// safe default role instead of propagating into presentation code;
    /// only a missing session credential is a hard error.
    pub async fn initialize(
        &self,
        credential_fingerprint: &str,
    ) -> Result<Snapshot, CoordinationError> {
        let token = self
            .provider
            .current_session()
            .await
            .map_err(|error| CoordinationError::IdentityProvider(error.to_string()))?;

        let identity = match self.directory.get_user().await {
            Ok(identity) => identity,
            Err(error) => {
                warn!(%error, "player directory unavailable; continuing as read-only guest");
                let snapshot = Snapshot::for_role(Role::Guest, None, None);
                self.events.emit(CoordinationEvent::AccessReady {
                    role: Role::Guest,
                    rank: Role::Guest.rank(),
                });
                return Ok(snapshot);
            }
        };

        let session = Session::new(token.session_id.clone(), &identity, Timestamp::now());

        let (reclaim_key, bound) = match self
            .binder
            .bind(&session, &identity, credential_fingerprint)
            .await
        {
            Ok(outcome) => {
                if let Some(faction_id) = identity.faction_id
                    && let Err(error) = self
                        .reconciler
                        .reconcile(&outcome.reclaim_key, &session, faction_id)
                        .await
                {
                    warn!(%error, "reconciliation failed; ownership heals on the next login");
                }
                (Some(outcome.reclaim_key), true)
            }
            Err(BinderError::MissingFaction) => {
                debug!(player = %identity.player_id, "player has no faction; nothing to bind");
                (None, false)
            }
            Err(error) => {
                warn!(%error, "identity binding unavailable; claim mutations disabled");
                (None, false)
            }
        };

        let role = self.resolve_current_role(&token, &identity).await;

        let snapshot = Snapshot::for_role(role, Some(identity.player_id), identity.faction_id);

        {
            let mut guard = self.state_mut();
            *guard = Some(SessionState {
                session,
                token,
                reclaim_key,
                role,
                bound,
                identity: identity.clone(),
            });
        }

        if let Some(faction_id) = identity.faction_id {
            self.spawn_role_watch(faction_id, identity.player_id);
        }

        self.events.emit(CoordinationEvent::AccessReady {
            role,
            rank: role.rank(),
        });

        Ok(snapshot)
    }

    /// The current resolved state. A facade that was never initialised
    /// reports a guest session.
    pub fn snapshot(&self) -> Snapshot {
        match self.state_ref().as_ref() {
            Some(state) => Snapshot::for_role(
                state.role,
                Some(state.identity.player_id),
                state.identity.faction_id,
            ),
            None => Snapshot::for_role(Role::Guest, None, None),
        }
    }

    /// Claim a target. Denied while identity binding is incomplete.
    pub async fn claim(
        &self,
        target_id: TargetId,
        kind: ClaimKind,
    ) -> Result<Claim, CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        let claim = self
            .ledger
            .claim(faction_id, target_id, kind, &state.session, state.role)
            .await?;
        Ok(claim)
    }

    /// Release the caller's own claim.
    pub async fn release(
        &self,
        target_id: TargetId,
        kind: ClaimKind,
    ) -> Result<(), CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        self.ledger
            .release(faction_id, target_id, kind, state.session.bound_player_id)
            .await?;
        Ok(())
    }

    /// Release any claim, regardless of owner. Requires the override
    /// permission.
    pub async fn override_release(
        &self,
        target_id: TargetId,
        kind: ClaimKind,
    ) -> Result<(), CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        self.ledger
            .override_release(
                faction_id,
                target_id,
                kind,
                state.session.bound_player_id,
                state.role,
            )
            .await?;
        Ok(())
    }

    /// All active claims in the faction. Works in read-only sessions.
    pub async fn list_active(
        &self,
        filter: Option<ClaimKind>,
    ) -> Result<Vec<Claim>, CoordinationError> {
        let (_, faction_id) = self.read_context()?;
        let claims = self.ledger.list_active(faction_id, filter).await?;
        Ok(claims)
    }

    /// Write or overwrite the shared note on a target.
    pub async fn set_note(
        &self,
        target_id: TargetId,
        body: String,
    ) -> Result<NoteRecord, CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        let note = self
            .ledger
            .set_note(faction_id, target_id, body, &state.session, state.role)
            .await?;
        Ok(note)
    }

    /// The shared note on a target. Works in read-only sessions.
    pub async fn note(&self, target_id: TargetId) -> Result<Option<NoteRecord>, CoordinationError> {
        let (_, faction_id) = self.read_context()?;
        let note = self.ledger.note(faction_id, target_id).await?;
        Ok(note)
    }

    /// All shared notes in the faction. Works in read-only sessions.
    pub async fn list_notes(&self) -> Result<Vec<(TargetId, NoteRecord)>, CoordinationError> {
        let (_, faction_id) = self.read_context()?;
        let notes = self.ledger.list_notes(faction_id).await?;
        Ok(notes)
    }

    /// Delete released claim records from the faction scope.
    pub async fn prune_released(&self) -> Result<usize, CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        let pruned = self.ledger.prune_released(faction_id, state.role).await?;
        Ok(pruned)
    }

    /// Re-run reconciliation for the bound reclaim key.
    ///
    /// Reconciliation normally happens during `initialize`; this is the
    /// on-demand retry for callers which want to heal ownership without
    /// waiting for the next login.
    pub async fn reconcile_now(&self) -> Result<MigrationResult, CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        let reclaim_key = state.reclaim_key.ok_or(CoordinationError::BindingRequired)?;
        let result = self
            .reconciler
            .reconcile(&reclaim_key, &state.session, faction_id)
            .await?;
        Ok(result)
    }

    /// Write the explicit per-faction role record for a member.
    ///
    /// The live role watch on the member's session picks the record up and
    /// re-resolves; the developer role is granted via allowlist only and
    /// can never be assigned.
    pub async fn assign_role(
        &self,
        target_player: PlayerId,
        role: Role,
    ) -> Result<(), CoordinationError> {
        let (state, faction_id) = self.mutation_context()?;
        require_permission(state.role, Permission::AssignRoles)?;

        if role == Role::Developer {
            return Err(CoordinationError::DeveloperAssignment);
        }

        let record = RoleRecord {
            role: role.as_str().to_owned(),
            assigned_by: state.session.bound_player_id,
            updated_at: Timestamp::now(),
        };
        with_timeout(
            self.config.store_timeout,
            set_record(
                &self.store,
                &StorePath::faction_role(faction_id, target_player),
                &record,
            ),
        )
        .await?;
        Ok(())
    }

    async fn resolve_current_role(&self, token: &SessionToken, identity: &PlayerIdentity) -> Role {
        let record_role = match identity.faction_id {
            Some(faction_id) => {
                let path = StorePath::faction_role(faction_id, identity.player_id);
                match with_timeout(
                    self.config.store_timeout,
                    get_record::<_, RoleRecord>(&self.store, &path),
                )
                .await
                {
                    Ok(record) => record.map(|record| record.role),
                    Err(error) => {
                        warn!(%error, "role record unavailable; resolving without it");
                        None
                    }
                }
            }
            None => None,
        };

        let signals = RoleSignals {
            is_on_developer_allowlist: self
                .config
                .developer_allowlist
                .contains(&identity.player_id),
            position_label: identity.position_label.clone(),
            identity_provider_role: token.custom_claims.role.clone(),
            per_faction_role_record: record_role
                .or_else(|| token.custom_claims.custom_role.clone()),
            has_faction_membership: identity.faction_id.is_some(),
        };
        resolve_role(&signals)
    }

    /// Watch the explicit role record and re-resolve on every change.
    ///
    /// Resolution always runs from fresh signals; the previous role is
    /// only consulted to decide whether a change event is due.
    fn spawn_role_watch(&self, faction_id: FactionId, player_id: PlayerId) {
        let store = self.store.clone();
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let allowlist = self.config.developer_allowlist.clone();

        tokio::spawn(async move {
            let path = StorePath::faction_role(faction_id, player_id);
            let mut receiver = match store.watch(&path).await {
                Ok(receiver) => receiver,
                Err(error) => {
                    warn!(%error, "role watch unavailable; live role changes disabled");
                    return;
                }
            };

            while receiver.changed().await.is_ok() {
                let record_role = receiver
                    .borrow_and_update()
                    .clone()
                    .and_then(|value| serde_json::from_value::<RoleRecord>(value).ok())
                    .map(|record| record.role);

                let resolved = {
                    let guard = state.read().expect("acquire coordination state lock");
                    guard.as_ref().map(|current| {
                        let signals = RoleSignals {
                            is_on_developer_allowlist: allowlist.contains(&player_id),
                            position_label: current.identity.position_label.clone(),
                            identity_provider_role: current.token.custom_claims.role.clone(),
                            per_faction_role_record: record_role
                                .or_else(|| current.token.custom_claims.custom_role.clone()),
                            has_faction_membership: current.identity.faction_id.is_some(),
                        };
                        (resolve_role(&signals), current.role)
                    })
                };

                let Some((role, previous)) = resolved else {
                    continue;
                };
                if role == previous {
                    continue;
                }

                {
                    let mut guard = state.write().expect("acquire coordination state lock");
                    if let Some(current) = guard.as_mut() {
                        current.role = role;
                    }
                }

                debug!(%player_id, %role, "live role change");
                events.emit(CoordinationEvent::AccessRoleChanged {
                    role,
                    rank: role.rank(),
                });
            }
        });
    }

    /// Context for claim-mutating operations: fails closed while identity
    /// binding is incomplete.
    fn mutation_context(&self) -> Result<(SessionState, FactionId), CoordinationError> {
        let state = self.context()?;
        if !state.bound {
            return Err(CoordinationError::BindingRequired);
        }
        let faction_id = state
            .session
            .bound_faction_id
            .ok_or(CoordinationError::BindingRequired)?;
        Ok((state, faction_id))
    }

    /// Context for read-only operations: usable even when binding failed.
    fn read_context(&self) -> Result<(SessionState, FactionId), CoordinationError> {
        let state = self.context()?;
        let faction_id = state
            .session
            .bound_faction_id
            .ok_or(CoordinationError::BindingRequired)?;
        Ok((state, faction_id))
    }

    fn context(&self) -> Result<SessionState, CoordinationError> {
        self.state_ref()
            .clone()
            .ok_or(CoordinationError::NotInitialized)
    }

    fn state_ref(&self) -> std::sync::RwLockReadGuard<'_, Option<SessionState>> {
        self.state.read().expect("acquire coordination state lock")
    }

    fn state_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<SessionState>> {
        self.state.write().expect("acquire coordination state lock")
    }
}

/// Error types for the coordination facade.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// No session credential could be obtained; nothing works without one.
    #[error("identity provider unavailable: {0}")]
    IdentityProvider(String),

    /// `initialize` has not completed for this facade.
    #[error("session not initialized")]
    NotInitialized,

    /// Identity binding has not succeeded; ownership-sensitive operations
    /// are denied until it does.
    #[error("identity binding incomplete; claim operations are disabled")]
    BindingRequired,

    /// The developer role is granted via allowlist only.
    #[error("the developer role cannot be assigned")]
    DeveloperAssignment,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Reconcile(#[from] ReconcilerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
