// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over an in-memory store.
use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::timeout;

use warband_core::{Claim, ClaimKind, FactionId, PlayerId, TargetId, Timestamp};
use warband_store::test_utils::FaultStore;
use warband_store::{MemoryStore, ReplicatedStore, StorePath, get_record, set_record};

use crate::access::Role;
use crate::events::{CoordinationEvent, EventSender};
use crate::facade::{
    CoordinationConfig, CoordinationError, CoordinationFacade, RoleRecord, Snapshot,
};
use crate::ledger::{ClaimError, ClaimLedger};
use crate::test_utils::{
    StaticIdentityProvider, StaticPlayerDirectory, UnreachableDirectory, identity, session,
    setup_logging, token,
};

const TIMEOUT: Duration = Duration::from_secs(15);
const FACTION: FactionId = FactionId::new(5);
const TARGET: TargetId = TargetId::new(200);
const FINGERPRINT: &str = "abcdef0123456789-stable-credential";

fn ledger(store: &MemoryStore) -> (ClaimLedger<MemoryStore>, EventSender) {
    let events = EventSender::new(64);
    (ClaimLedger::new(store.clone(), events.clone(), TIMEOUT), events)
}

fn facade(
    store: MemoryStore,
    player_id: u64,
    session_id: &str,
) -> CoordinationFacade<MemoryStore, StaticPlayerDirectory, StaticIdentityProvider> {
    CoordinationFacade::new(
        store,
        StaticPlayerDirectory::new(identity(player_id, Some(5))),
        StaticIdentityProvider::new(token(session_id)),
        CoordinationConfig::default(),
    )
}

fn slot(target: TargetId, kind: ClaimKind) -> StorePath {
    StorePath::claim_slot(FACTION, target, kind.class())
}

#[tokio::test]
async fn initialize_resolves_role_and_emits_access_ready() {
    setup_logging();
    let store = MemoryStore::new();
    let facade = facade(store.clone(), 100, "s1");
    let mut events = facade.subscribe();

    let snapshot = facade.initialize(FINGERPRINT).await.unwrap();
    assert_eq!(
        snapshot,
        Snapshot {
            player_id: Some(PlayerId::new(100)),
            faction_id: Some(FACTION),
            role: Role::Member,
            rank: 1,
            is_leader_effective: false,
            can_write_leader_ops: false,
        }
    );

    assert_eq!(
        events.recv().await.unwrap(),
        CoordinationEvent::AccessReady {
            role: Role::Member,
            rank: 1
        }
    );

    assert_eq!(facade.snapshot(), snapshot);

    // On-demand reconciliation with nothing to migrate is a no-op.
    assert_eq!(
        facade.reconcile_now().await.unwrap(),
        crate::reconciler::MigrationResult::NoOp
    );
}

#[tokio::test]
async fn relogin_from_a_new_device_reclaims_existing_claims() {
    setup_logging();
    let store = MemoryStore::new();

    // Player 100 logs in under session s1 and claims target 200.
    let first_login = facade(store.clone(), 100, "s1");
    first_login.initialize(FINGERPRINT).await.unwrap();
    let claim = first_login.claim(TARGET, ClaimKind::Attack).await.unwrap();
    assert_eq!(claim.session_id, "s1".into());

    // The same player logs in from a new device: same credential, new
    // session s2.
    let second_login = facade(store.clone(), 100, "s2");
    second_login.initialize(FINGERPRINT).await.unwrap();

    // The claim now belongs to the player's stable identity under s2.
    let migrated: Claim = get_record(&store, &slot(TARGET, ClaimKind::Attack))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(migrated.session_id, "s2".into());
    assert_eq!(migrated.claimed_by, PlayerId::new(100));
    assert!(migrated.is_active());

    // And the reclaim index points at s2.
    let key = warband_core::ReclaimKey::derive(FACTION, FINGERPRINT);
    let index: crate::binder::ReclaimRecord =
        get_record(&store, &StorePath::reclaim_index(&key))
            .await
            .unwrap()
            .unwrap();
    assert_eq!(index.session_id, "s2".into());

    // Releasing through the new session works: ownership followed the
    // player, not the session.
    second_login.release(TARGET, ClaimKind::Attack).await.unwrap();
}

#[tokio::test]
async fn sequential_claims_on_one_slot_leave_exactly_one_winner() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    let won = ledger
        .claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &anni,
            Role::Member,
            Timestamp::from_millis(1_000),
        )
        .await;
    assert!(won.is_ok());

    let lost = ledger
        .claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &bors,
            Role::Member,
            Timestamp::from_millis(2_000),
        )
        .await;
    assert!(
        matches!(lost, Err(ClaimError::AlreadyClaimed { holder }) if holder == PlayerId::new(100))
    );
}

#[tokio::test]
async fn earlier_claim_wins_even_when_its_write_arrives_second() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    // Bors' later-stamped claim reaches the store first.
    ledger
        .claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &bors,
            Role::Member,
            Timestamp::from_millis(2_000),
        )
        .await
        .unwrap();

    // Anni's earlier-stamped claim arrives afterwards and still wins; the
    // losing write is rolled back.
    let reclaimed = ledger
        .claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &anni,
            Role::Member,
            Timestamp::from_millis(1_000),
        )
        .await
        .unwrap();
    assert_eq!(reclaimed.claimed_by, PlayerId::new(100));

    let settled: Claim = get_record(&store, &slot(TARGET, ClaimKind::Attack))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.claimed_by, PlayerId::new(100));
    assert_eq!(settled.claimed_at, Timestamp::from_millis(1_000));
}

#[tokio::test]
async fn identical_timestamps_tie_break_on_player_id() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let high = session("s-high", &identity(101, Some(5)));
    let low = session("s-low", &identity(100, Some(5)));
    let instant = Timestamp::from_millis(1_000);

    ledger
        .claim_at(FACTION, TARGET, ClaimKind::Attack, &high, Role::Member, instant)
        .await
        .unwrap();

    ledger
        .claim_at(FACTION, TARGET, ClaimKind::Attack, &low, Role::Member, instant)
        .await
        .unwrap();

    let settled: Claim = get_record(&store, &slot(TARGET, ClaimKind::Attack))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.claimed_by, PlayerId::new(100));
}

#[tokio::test(start_paused = true)]
async fn jittered_concurrent_claims_converge_on_the_earlier_writer() {
    setup_logging();
    let shared = MemoryStore::new();
    let store_a = FaultStore::new(shared.clone(), 17).with_latency(1, 40);
    let store_b = FaultStore::new(shared.clone(), 91).with_latency(1, 40);

    let events = EventSender::new(64);
    let ledger_a = ClaimLedger::new(store_a, events.clone(), TIMEOUT);
    let ledger_b = ClaimLedger::new(store_b, events.clone(), TIMEOUT);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    let (from_a, from_b) = tokio::join!(
        ledger_a.claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &anni,
            Role::Member,
            Timestamp::from_millis(1_000),
        ),
        ledger_b.claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &bors,
            Role::Member,
            Timestamp::from_millis(2_000),
        ),
    );

    // Whatever the interleaving, the earlier-stamped claim holds the slot
    // and its writer observed success.
    assert!(from_a.is_ok());
    let settled: Claim = get_record(&shared, &slot(TARGET, ClaimKind::Attack))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.claimed_by, PlayerId::new(100));
    assert!(settled.is_active());

    // The later writer either lost synchronously or had its write rolled
    // back after the fact; it never ends up holding the slot.
    if let Err(error) = from_b {
        assert!(matches!(error, ClaimError::AlreadyClaimed { .. }));
    }
}

#[tokio::test]
async fn dib_and_attack_contend_for_the_same_slot() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    ledger
        .claim(FACTION, TARGET, ClaimKind::Dib, &anni, Role::Member)
        .await
        .unwrap();

    let blocked = ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &bors, Role::Member)
        .await;
    assert!(matches!(blocked, Err(ClaimError::AlreadyClaimed { .. })));

    // A med deal is a different exclusivity class and passes.
    ledger
        .claim(FACTION, TARGET, ClaimKind::MedDeal, &bors, Role::Member)
        .await
        .unwrap();
}

#[tokio::test]
async fn guests_cannot_claim() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);
    let ghost = session("s-ghost", &identity(999, Some(5)));

    let denied = ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &ghost, Role::Guest)
        .await;
    assert!(matches!(denied, Err(ClaimError::Permission(_))));

    // Nothing was written.
    let vacant = store.get(&slot(TARGET, ClaimKind::Attack)).await.unwrap();
    assert!(vacant.is_none());
}

#[tokio::test]
async fn release_is_owner_only_and_override_is_role_gated() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, events) = ledger(&store);
    let mut receiver = events.subscribe();

    let anni = session("s-anni", &identity(100, Some(5)));

    ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &anni, Role::Member)
        .await
        .unwrap();
    receiver.recv().await.unwrap();

    // Another member cannot release it, with or without the override path.
    let not_owner = ledger
        .release(FACTION, TARGET, ClaimKind::Attack, PlayerId::new(101))
        .await;
    assert!(
        matches!(not_owner, Err(ClaimError::NotOwner { holder }) if holder == PlayerId::new(100))
    );

    let denied = ledger
        .override_release(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            PlayerId::new(101),
            Role::Member,
        )
        .await;
    assert!(matches!(denied, Err(ClaimError::Permission(_))));

    // A leader releases anyone's claim.
    ledger
        .override_release(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            PlayerId::new(102),
            Role::Leader,
        )
        .await
        .unwrap();
    assert_eq!(
        receiver.recv().await.unwrap(),
        CoordinationEvent::TargetReleased { target_id: TARGET }
    );

    // The slot is free again.
    let gone = ledger
        .release(FACTION, TARGET, ClaimKind::Attack, PlayerId::new(100))
        .await;
    assert!(matches!(gone, Err(ClaimError::NotFound)));
}

#[tokio::test]
async fn events_fire_only_after_acknowledged_writes() {
    setup_logging();
    let store = FaultStore::new(MemoryStore::new(), 23);
    let events = EventSender::new(64);
    let ledger = ClaimLedger::new(store.clone(), events.clone(), TIMEOUT);
    let mut receiver = events.subscribe();

    let anni = session("s-anni", &identity(100, Some(5)));

    store.fail_writes_after(0);
    let failed = ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &anni, Role::Member)
        .await;
    assert!(matches!(failed, Err(ClaimError::Store(_))));
    assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));

    store.heal();
    ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &anni, Role::Member)
        .await
        .unwrap();
    assert!(matches!(
        receiver.try_recv(),
        Ok(CoordinationEvent::TargetClaimed { .. })
    ));
}

#[tokio::test]
async fn store_outage_degrades_to_read_only() {
    setup_logging();
    let store = FaultStore::new(MemoryStore::new(), 29);
    store.fail_writes_after(0);

    let facade = CoordinationFacade::new(
        store.clone(),
        StaticPlayerDirectory::new(identity(100, Some(5))),
        StaticIdentityProvider::new(token("s1")),
        CoordinationConfig::default(),
    );

    // Initialise succeeds in degraded form: role resolved, binding absent.
    let snapshot = facade.initialize(FINGERPRINT).await.unwrap();
    assert_eq!(snapshot.role, Role::Member);

    // Ownership-sensitive operations fail closed...
    let denied = facade.claim(TARGET, ClaimKind::Attack).await;
    assert!(matches!(denied, Err(CoordinationError::BindingRequired)));

    // ...while read-only browsing stays open.
    assert_eq!(facade.list_active(None).await.unwrap(), vec![]);
}

#[tokio::test]
async fn directory_outage_degrades_to_guest() {
    setup_logging();
    let facade = CoordinationFacade::new(
        MemoryStore::new(),
        UnreachableDirectory,
        StaticIdentityProvider::new(token("s1")),
        CoordinationConfig::default(),
    );

    let snapshot = facade.initialize(FINGERPRINT).await.unwrap();
    assert_eq!(snapshot.role, Role::Guest);
    assert_eq!(snapshot.player_id, None);

    let denied = facade.claim(TARGET, ClaimKind::Attack).await;
    assert!(matches!(denied, Err(CoordinationError::NotInitialized)));
}

#[tokio::test]
async fn developer_allowlist_overrides_every_signal() {
    setup_logging();
    let config = CoordinationConfig {
        developer_allowlist: HashSet::from([PlayerId::new(100)]),
        ..Default::default()
    };

    let facade = CoordinationFacade::new(
        MemoryStore::new(),
        StaticPlayerDirectory::new(identity(100, Some(5))),
        StaticIdentityProvider::new(token("s1")),
        config,
    );

    let snapshot = facade.initialize(FINGERPRINT).await.unwrap();
    assert_eq!(snapshot.role, Role::Developer);
    assert!(snapshot.is_leader_effective);
    assert!(snapshot.can_write_leader_ops);
}

#[tokio::test]
async fn assigned_role_records_feed_the_live_watch() {
    setup_logging();
    let store = MemoryStore::new();
    let facade = facade(store.clone(), 100, "s1");

    facade.initialize(FINGERPRINT).await.unwrap();
    assert_eq!(facade.snapshot().role, Role::Member);
    let mut events = facade.subscribe();

    // Let the spawned watch register before the record lands.
    tokio::task::yield_now().await;

    // A leader elsewhere writes the explicit role record for player 100.
    let record = RoleRecord {
        role: "co-leader".to_owned(),
        assigned_by: PlayerId::new(7),
        updated_at: Timestamp::now(),
    };
    set_record(
        &store,
        &StorePath::faction_role(FACTION, PlayerId::new(100)),
        &record,
    )
    .await
    .unwrap();

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("role watch fires")
        .unwrap();
    assert_eq!(
        event,
        CoordinationEvent::AccessRoleChanged {
            role: Role::CoLeader,
            rank: Role::CoLeader.rank()
        }
    );
    assert_eq!(facade.snapshot().role, Role::CoLeader);
}

#[tokio::test]
async fn assign_role_requires_the_permission_and_rejects_developer() {
    setup_logging();
    let store = MemoryStore::new();

    // A plain member cannot assign roles.
    let member = facade(store.clone(), 100, "s1");
    member.initialize(FINGERPRINT).await.unwrap();
    let denied = member.assign_role(PlayerId::new(101), Role::Admin).await;
    assert!(matches!(denied, Err(CoordinationError::Access(_))));

    // A leader can, except for the developer role.
    let leader_store = MemoryStore::new();
    let leader = CoordinationFacade::new(
        leader_store.clone(),
        StaticPlayerDirectory::new(warband_core::PlayerIdentity {
            position_label: Some("Leader".to_owned()),
            ..identity(7, Some(5))
        }),
        StaticIdentityProvider::new(token("s-leader")),
        CoordinationConfig::default(),
    );
    leader.initialize(FINGERPRINT).await.unwrap();

    leader.assign_role(PlayerId::new(101), Role::Admin).await.unwrap();
    let record: RoleRecord = get_record(
        &leader_store,
        &StorePath::faction_role(FACTION, PlayerId::new(101)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(record.role, "admin");
    assert_eq!(record.assigned_by, PlayerId::new(7));

    let rejected = leader.assign_role(PlayerId::new(101), Role::Developer).await;
    assert!(matches!(rejected, Err(CoordinationError::DeveloperAssignment)));
}

#[tokio::test]
async fn notes_are_shared_and_management_is_gated() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    ledger
        .set_note(FACTION, TARGET, "stacked, hit late".to_owned(), &anni, Role::Member)
        .await
        .unwrap();

    // Another member cannot overwrite a foreign note...
    let denied = ledger
        .set_note(FACTION, TARGET, "free hit".to_owned(), &bors, Role::Member)
        .await;
    assert!(matches!(denied, Err(ClaimError::Permission(_))));

    // ...an admin can.
    let overwritten = ledger
        .set_note(FACTION, TARGET, "verified stacked".to_owned(), &bors, Role::Admin)
        .await
        .unwrap();
    assert_eq!(overwritten.owner, PlayerId::new(101));

    let notes = ledger.list_notes(FACTION).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, TARGET);
    assert_eq!(notes[0].1.body, "verified stacked");
}

#[tokio::test]
async fn prune_removes_only_released_claims() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));

    ledger
        .claim(FACTION, TARGET, ClaimKind::Attack, &anni, Role::Member)
        .await
        .unwrap();
    ledger
        .claim(FACTION, TargetId::new(201), ClaimKind::Farm, &anni, Role::Member)
        .await
        .unwrap();
    ledger
        .release(FACTION, TARGET, ClaimKind::Attack, PlayerId::new(100))
        .await
        .unwrap();

    let denied = ledger.prune_released(FACTION, Role::Member).await;
    assert!(matches!(denied, Err(ClaimError::Permission(_))));

    let pruned = ledger.prune_released(FACTION, Role::CoLeader).await.unwrap();
    assert_eq!(pruned, 1);

    let remaining = ledger.list_active(FACTION, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind, ClaimKind::Farm);
}

#[tokio::test]
async fn list_active_filters_by_kind_and_orders_by_age() {
    setup_logging();
    let store = MemoryStore::new();
    let (ledger, _events) = ledger(&store);

    let anni = session("s-anni", &identity(100, Some(5)));
    let bors = session("s-bors", &identity(101, Some(5)));

    ledger
        .claim_at(
            FACTION,
            TargetId::new(201),
            ClaimKind::Farm,
            &anni,
            Role::Member,
            Timestamp::from_millis(2_000),
        )
        .await
        .unwrap();
    ledger
        .claim_at(
            FACTION,
            TARGET,
            ClaimKind::Attack,
            &bors,
            Role::Member,
            Timestamp::from_millis(1_000),
        )
        .await
        .unwrap();

    let all = ledger.list_active(FACTION, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].target_id, TARGET, "oldest claim first");

    let farms = ledger.list_active(FACTION, Some(ClaimKind::Farm)).await.unwrap();
    assert_eq!(farms.len(), 1);
    assert_eq!(farms[0].target_id, TargetId::new(201));
}
