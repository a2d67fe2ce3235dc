// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic resolution of an effective role from identity signals.
use crate::access::Role;

/// The identity signals feeding role resolution.
///
/// Signals arrive from four independent sources which can disagree: the
/// external player profile (`position_label`), the identity provider's
/// custom claims (`identity_provider_role`), the static developer
/// allowlist, and the explicit per-faction role record a leader may have
/// written. Resolution is re-run from fresh signals on every permission
/// boundary; nothing here is cached across faction or profile changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSignals {
    pub is_on_developer_allowlist: bool,
    pub position_label: Option<String>,
    pub identity_provider_role: Option<String>,
    pub per_faction_role_record: Option<String>,
    pub has_faction_membership: bool,
}

/// Resolve the effective role for a set of identity signals.
///
/// Pure and deterministic; first matching rule wins:
///
/// 1. developer allowlist membership;
/// 2. a "leader" position label or provider role claim;
/// 3. a "co-leader" position label;
/// 4. the explicit per-faction role record, folded to the enum;
/// 5. a position label containing "admin" or "officer";
/// 6. plain faction membership;
/// 7. otherwise guest.
pub fn resolve_role(signals: &RoleSignals) -> Role {
    let position = normalized(signals.position_label.as_deref());
    let provider_role = normalized(signals.identity_provider_role.as_deref());

    if signals.is_on_developer_allowlist {
        return Role::Developer;
    }

    if position.as_deref() == Some("leader") || provider_role.as_deref() == Some("leader") {
        return Role::Leader;
    }

    if matches!(position.as_deref(), Some("co-leader" | "coleader")) {
        return Role::CoLeader;
    }

    if let Some(record) = &signals.per_faction_role_record {
        return Role::from_record(record);
    }

    if position
        .as_deref()
        .is_some_and(|label| label.contains("admin") || label.contains("officer"))
    {
        return Role::Admin;
    }

    if signals.has_faction_membership {
        return Role::Member;
    }

    Role::Guest
}

fn normalized(value: Option<&str>) -> Option<String> {
    value.map(|raw| raw.trim().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{RoleSignals, resolve_role};
    use crate::access::Role;

    fn member_signals() -> RoleSignals {
        RoleSignals {
            has_faction_membership: true,
            ..Default::default()
        }
    }

    #[test]
    fn no_signals_resolves_guest() {
        assert_eq!(resolve_role(&RoleSignals::default()), Role::Guest);
    }

    #[test]
    fn membership_alone_resolves_member() {
        assert_eq!(resolve_role(&member_signals()), Role::Member);
    }

    #[test]
    fn allowlist_beats_every_other_signal() {
        let signals = RoleSignals {
            is_on_developer_allowlist: true,
            position_label: Some("Leader".to_owned()),
            identity_provider_role: Some("leader".to_owned()),
            per_faction_role_record: Some("guest".to_owned()),
            has_faction_membership: true,
        };
        assert_eq!(resolve_role(&signals), Role::Developer);
    }

    #[test]
    fn leader_label_or_provider_claim_resolves_leader() {
        let by_label = RoleSignals {
            position_label: Some("Leader".to_owned()),
            ..member_signals()
        };
        let by_claim = RoleSignals {
            identity_provider_role: Some("LEADER".to_owned()),
            ..member_signals()
        };
        assert_eq!(resolve_role(&by_label), Role::Leader);
        assert_eq!(resolve_role(&by_claim), Role::Leader);
    }

    #[test]
    fn co_leader_label_spellings() {
        for label in ["Co-Leader", "coleader", " co-leader "] {
            let signals = RoleSignals {
                position_label: Some(label.to_owned()),
                ..member_signals()
            };
            assert_eq!(resolve_role(&signals), Role::CoLeader, "label {label:?}");
        }
    }

    #[test]
    fn explicit_record_beats_admin_label() {
        let signals = RoleSignals {
            position_label: Some("Chief Officer".to_owned()),
            per_faction_role_record: Some("member".to_owned()),
            ..member_signals()
        };
        assert_eq!(resolve_role(&signals), Role::Member);
    }

    #[test]
    fn unrecognised_record_folds_to_member() {
        let signals = RoleSignals {
            per_faction_role_record: Some("warlord".to_owned()),
            ..member_signals()
        };
        assert_eq!(resolve_role(&signals), Role::Member);
    }

    #[test]
    fn admin_and_officer_labels_resolve_admin() {
        for label in ["Administrator", "chief officer", "Admin"] {
            let signals = RoleSignals {
                position_label: Some(label.to_owned()),
                ..member_signals()
            };
            assert_eq!(resolve_role(&signals), Role::Admin, "label {label:?}");
        }
    }

    #[test]
    fn leader_beats_explicit_record() {
        let signals = RoleSignals {
            position_label: Some("leader".to_owned()),
            per_faction_role_record: Some("member".to_owned()),
            ..member_signals()
        };
        assert_eq!(resolve_role(&signals), Role::Leader);
    }

    #[test]
    fn resolution_is_stable_across_repeated_calls() {
        let signals = RoleSignals {
            position_label: Some("Officer".to_owned()),
            ..member_signals()
        };
        let first = resolve_role(&signals);
        for _ in 0..16 {
            assert_eq!(resolve_role(&signals), first);
        }
    }
}
