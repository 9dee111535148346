use std::fmt::{Display, Formatter};
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use council_core::AppError;
use serde::{Deserialize, Serialize};

/// Permission flags granted by roles.
///
/// Each variant occupies one bit of a [`PermissionSet`]; the bit positions are
/// part of the storage format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows casting positions on ongoing votes.
    Vote,
    /// Allows opening new votes.
    StartVote,
    /// Allows concluding votes.
    ConcludeVote,
    /// Allows vetoing ongoing votes.
    Veto,
    /// Allows reading internal information.
    InternalInfo,
    /// Allows reading public information.
    PublicInfo,
    /// Allows submitting suggestions.
    Suggest,
    /// Allows creating and modifying roles.
    CreateRole,
    /// Allows reading the audit log.
    AuditLog,
    /// Allows contesting a veto.
    ContestVeto,
    /// Allows suspending users.
    SuspendUser,
    /// Allows removing role bindings.
    RemoveRole,
    /// Allows assigning roles.
    AssignRole,
    /// Allows restoring suspended users.
    RestoreUser,
}

impl Permission {
    /// Returns the bit occupied by this permission.
    #[must_use]
    pub fn bit(&self) -> u64 {
        let shift = match self {
            Self::Vote => 0,
            Self::StartVote => 1,
            Self::ConcludeVote => 2,
            Self::Veto => 3,
            Self::InternalInfo => 4,
            Self::PublicInfo => 5,
            Self::Suggest => 6,
            Self::CreateRole => 7,
            Self::AuditLog => 8,
            Self::ContestVeto => 9,
            Self::SuspendUser => 10,
            Self::RemoveRole => 11,
            Self::AssignRole => 12,
            Self::RestoreUser => 13,
        };

        1 << shift
    }

    /// Returns a stable transport value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::StartVote => "start_vote",
            Self::ConcludeVote => "conclude_vote",
            Self::Veto => "veto",
            Self::InternalInfo => "internal_info",
            Self::PublicInfo => "public_info",
            Self::Suggest => "suggest",
            Self::CreateRole => "create_role",
            Self::AuditLog => "audit_log",
            Self::ContestVeto => "contest_veto",
            Self::SuspendUser => "suspend_user",
            Self::RemoveRole => "remove_role",
            Self::AssignRole => "assign_role",
            Self::RestoreUser => "restore_user",
        }
    }

    /// Returns all known permissions in bit order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::Vote,
            Permission::StartVote,
            Permission::ConcludeVote,
            Permission::Veto,
            Permission::InternalInfo,
            Permission::PublicInfo,
            Permission::Suggest,
            Permission::CreateRole,
            Permission::AuditLog,
            Permission::ContestVeto,
            Permission::SuspendUser,
            Permission::RemoveRole,
            Permission::AssignRole,
            Permission::RestoreUser,
        ];

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Bitset of permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    /// Returns an empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    /// Creates a set from raw stored bits. Unknown bits are kept as-is.
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Returns whether no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true iff every bit of `required` is also set in `self`.
    #[must_use]
    pub fn contains(&self, required: PermissionSet) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns whether the single permission is granted.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.contains(permission.into())
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn union(self, other: PermissionSet) -> Self {
        Self(self.0 | other.0)
    }

    /// Lists the known permissions present in the set.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> {
        Permission::all()
            .iter()
            .copied()
            .filter(|permission| self.has(*permission))
            .collect()
    }
}

impl From<Permission> for PermissionSet {
    fn from(value: Permission) -> Self {
        Self(value.bit())
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, permission| set | permission)
    }
}

impl BitOr for PermissionSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOr<Permission> for PermissionSet {
    type Output = Self;

    fn bitor(self, rhs: Permission) -> Self::Output {
        self.union(rhs.into())
    }
}

impl BitOr for Permission {
    type Output = PermissionSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionSet::from(self) | rhs
    }
}

impl BitOrAssign for PermissionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for PermissionSet {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .permissions()
            .iter()
            .map(Permission::as_str)
            .collect();
        write!(formatter, "[{}]", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{Permission, PermissionSet};

    #[test]
    fn permission_roundtrip_transport_value() {
        for permission in Permission::all() {
            let restored = Permission::from_str(permission.as_str());
            assert_eq!(restored.ok(), Some(*permission));
        }
    }

    #[test]
    fn unknown_permission_is_rejected() {
        assert!(Permission::from_str("launch_rockets").is_err());
    }

    #[test]
    fn permission_bits_are_distinct_and_stable() {
        let combined: PermissionSet = Permission::all().iter().copied().collect();
        assert_eq!(combined.bits(), (1 << 14) - 1);
        assert_eq!(Permission::AssignRole.bit(), 1 << 12);
    }

    #[test]
    fn empty_set_contains_only_empty_requirement() {
        let empty = PermissionSet::empty();
        assert!(empty.contains(PermissionSet::empty()));
        assert!(!empty.has(Permission::Vote));
    }

    #[test]
    fn display_lists_permission_names() {
        let set = Permission::Vote | Permission::Veto;
        assert_eq!(set.to_string(), "[vote,veto]");
    }

    proptest! {
        #[test]
        fn union_contains_each_operand(left in any::<u64>(), right in any::<u64>()) {
            let left = PermissionSet::from_bits(left);
            let right = PermissionSet::from_bits(right);
            prop_assert!((left | right).contains(left));
            prop_assert!((left | right).contains(right));
        }

        #[test]
        fn missing_bit_is_never_contained(held in any::<u64>(), bit in 0_u32..64) {
            let held = PermissionSet::from_bits(held & !(1_u64 << bit));
            let required = PermissionSet::from_bits(held.bits() | (1_u64 << bit));
            prop_assert!(!held.contains(required));
        }
    }
}
