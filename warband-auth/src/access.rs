// SPDX-License-Identifier: MIT OR Apache-2.0

//! Roles and the permissions they imply.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The effective permission roles which can be resolved for a player.
///
/// Roles are ordered such that "higher" roles hold a strict superset of the
/// permissions of all lower ones, with one exception at the top: `Leader`
/// and `Developer` both hold the full permission set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Guest,
    Member,
    Admin,
    CoLeader,
    Leader,
    Developer,
}

const GUEST_PERMISSIONS: &[Permission] = &[Permission::ViewClaims];

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::ViewClaims,
    Permission::ClaimAttack,
    Permission::ClaimMedDeal,
    Permission::ClaimFarm,
    Permission::ClaimDib,
    Permission::ReleaseOwn,
    Permission::WriteNotes,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewClaims,
    Permission::ClaimAttack,
    Permission::ClaimMedDeal,
    Permission::ClaimFarm,
    Permission::ClaimDib,
    Permission::ReleaseOwn,
    Permission::WriteNotes,
    Permission::ManageNotes,
];

const CO_LEADER_PERMISSIONS: &[Permission] = &[
    Permission::ViewClaims,
    Permission::ClaimAttack,
    Permission::ClaimMedDeal,
    Permission::ClaimFarm,
    Permission::ClaimDib,
    Permission::ReleaseOwn,
    Permission::WriteNotes,
    Permission::ManageNotes,
    Permission::PruneReleased,
];

const FULL_PERMISSIONS: &[Permission] = &[
    Permission::ViewClaims,
    Permission::ClaimAttack,
    Permission::ClaimMedDeal,
    Permission::ClaimFarm,
    Permission::ClaimDib,
    Permission::ReleaseOwn,
    Permission::WriteNotes,
    Permission::ManageNotes,
    Permission::PruneReleased,
    Permission::ReleaseAny,
    Permission::AssignRoles,
    Permission::WriteLeaderOps,
];

impl Role {
    /// Numeric rank surfaced to presentation collaborators.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Guest => 0,
            Role::Member => 1,
            Role::Admin => 2,
            Role::CoLeader => 3,
            Role::Leader => 4,
            Role::Developer => 5,
        }
    }

    /// `Leader` and `Developer` both sit at the top of the hierarchy.
    pub fn is_maximal(&self) -> bool {
        matches!(self, Role::Leader | Role::Developer)
    }

    /// The full set of permissions this role holds.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Guest => GUEST_PERMISSIONS,
            Role::Member => MEMBER_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::CoLeader => CO_LEADER_PERMISSIONS,
            Role::Leader | Role::Developer => FULL_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Parse an explicit per-faction role record value.
    ///
    /// Record values are case-normalised; unrecognised values fold to
    /// `Member` so a corrupt record can never widen permissions.
    pub fn from_record(value: &str) -> Role {
        match value.trim().to_ascii_lowercase().as_str() {
            "guest" => Role::Guest,
            "admin" => Role::Admin,
            "co-leader" | "coleader" => Role::CoLeader,
            "leader" => Role::Leader,
            "developer" => Role::Developer,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::CoLeader => "co-leader",
            Role::Leader => "leader",
            Role::Developer => "developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of actions a role can be granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    ViewClaims,
    ClaimAttack,
    ClaimMedDeal,
    ClaimFarm,
    ClaimDib,
    ReleaseOwn,
    WriteNotes,
    ManageNotes,
    PruneReleased,
    ReleaseAny,
    AssignRoles,
    WriteLeaderOps,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewClaims => "viewClaims",
            Permission::ClaimAttack => "claimAttack",
            Permission::ClaimMedDeal => "claimMedDeal",
            Permission::ClaimFarm => "claimFarm",
            Permission::ClaimDib => "claimDib",
            Permission::ReleaseOwn => "releaseOwn",
            Permission::WriteNotes => "writeNotes",
            Permission::ManageNotes => "manageNotes",
            Permission::PruneReleased => "pruneReleased",
            Permission::ReleaseAny => "releaseAny",
            Permission::AssignRoles => "assignRoles",
            Permission::WriteLeaderOps => "writeLeaderOps",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check a role for a permission, failing with the denied action so it can
/// be surfaced to the user. Callers must not perform the side effect on
/// denial.
pub fn require_permission(role: Role, permission: Permission) -> Result<(), AccessError> {
    if role.has_permission(permission) {
        Ok(())
    } else {
        Err(AccessError::PermissionDenied { role, permission })
    }
}

/// Error types for permission checks.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// The resolved role lacks the permission the action requires.
    #[error("role {role} lacks permission {permission}")]
    PermissionDenied { role: Role, permission: Permission },
}
