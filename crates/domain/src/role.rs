//! Roles, role bindings and the built-in role catalogue.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use council_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Permission, PermissionSet};

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid role id '{value}': {error}")))
    }
}

/// Caller-supplied definition of a dynamic role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    /// Display name.
    pub name: String,
    /// Granted permissions.
    pub permissions: PermissionSet,
    /// Whether the role may only be held by one user at a time.
    pub unique: bool,
    /// Grant lifetime in seconds.
    pub timeout_seconds: u64,
    /// Whether bindings issued through this role are revoked with it.
    pub cascade: bool,
}

/// Role entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    permissions: PermissionSet,
    unique: bool,
    timeout_seconds: u64,
    cascade: bool,
    builtin: bool,
}

/// Longest grant lifetime a dynamic role may state, one hundred years.
pub const MAX_ROLE_TIMEOUT_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

impl Role {
    /// Builds a dynamic role from a draft.
    ///
    /// Dynamic roles must state a non-zero timeout; zero is reserved as the
    /// "never expires" sentinel of the built-in roles.
    pub fn from_draft(id: RoleId, draft: RoleDraft) -> AppResult<Self> {
        if draft.timeout_seconds == 0 {
            return Err(AppError::Validation(
                "role timeout must be stated and greater than zero".to_owned(),
            ));
        }

        if draft.timeout_seconds > MAX_ROLE_TIMEOUT_SECONDS {
            return Err(AppError::Validation(format!(
                "role timeout {} exceeds the maximum of {MAX_ROLE_TIMEOUT_SECONDS} seconds",
                draft.timeout_seconds
            )));
        }

        Ok(Self {
            id,
            name: NonEmptyString::new(draft.name)?,
            permissions: draft.permissions,
            unique: draft.unique,
            timeout_seconds: draft.timeout_seconds,
            cascade: draft.cascade,
            builtin: false,
        })
    }

    /// Rehydrates a role from storage without re-running draft validation.
    #[must_use]
    pub fn restore(
        id: RoleId,
        name: NonEmptyString,
        permissions: PermissionSet,
        unique: bool,
        timeout_seconds: u64,
        cascade: bool,
        builtin: bool,
    ) -> Self {
        Self {
            id,
            name,
            permissions,
            unique,
            timeout_seconds,
            cascade,
            builtin,
        }
    }

    /// Returns role id.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns role name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns granted permissions.
    #[must_use]
    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    /// Returns whether the role is exclusive.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Returns the grant lifetime in seconds, zero meaning "never expires".
    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Returns whether revocation cascades to bindings issued through the role.
    #[must_use]
    pub fn cascade(&self) -> bool {
        self.cascade
    }

    /// Returns whether the role is part of the seeded catalogue.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Returns the instant a binding issued at `issued_at` lapses, if ever.
    #[must_use]
    pub fn binding_expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.timeout_seconds == 0 {
            return None;
        }

        let seconds = i64::try_from(self.timeout_seconds).ok()?;
        issued_at.checked_add_signed(Duration::try_seconds(seconds)?)
    }
}

/// Grant of a role to a user, with its issuance provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// Holder of the role.
    pub user_id: String,
    /// Granted role.
    pub role_id: RoleId,
    /// User whose grant issued this binding.
    pub issuer_id: Option<String>,
    /// Role through which this binding was issued.
    pub issuer_role_id: Option<RoleId>,
    /// Instant the binding was created.
    pub issued_at: DateTime<Utc>,
}

/// Reason attached to a role update event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChangeReason {
    /// No particular reason.
    None,
    /// The role moved to a new holder.
    Transferal,
    /// The grant window elapsed.
    Timeout,
    /// The issuing grant was revoked.
    Cascading,
    /// A user removed the binding explicitly.
    RemovedByUser,
}

impl RoleChangeReason {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Transferal => "transferal",
            Self::Timeout => "timeout",
            Self::Cascading => "cascading",
            Self::RemovedByUser => "removed_by_user",
        }
    }
}

/// Direction of a role update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleUpdateType {
    /// A binding was created.
    Added,
    /// A binding was removed.
    Removed,
}

/// Roles seeded at initialization. Their timeout is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRole {
    /// Chair of the council.
    Chairmen,
    /// Deputy chair.
    CoChairmen,
    /// Voting member.
    Member,
    /// Non-voting observer.
    Observer,
    /// Oversight role able to veto.
    Watchdog,
}

impl BuiltinRole {
    /// Returns every built-in role.
    #[must_use]
    pub fn all() -> [Self; 5] {
        [
            Self::Chairmen,
            Self::CoChairmen,
            Self::Member,
            Self::Observer,
            Self::Watchdog,
        ]
    }

    /// Returns the fixed role id used in storage.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        let value = match self {
            Self::Chairmen => 1,
            Self::CoChairmen => 2,
            Self::Member => 3,
            Self::Observer => 4,
            Self::Watchdog => 5,
        };

        RoleId::from_uuid(Uuid::from_u128(value))
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chairmen => "Chairmen",
            Self::CoChairmen => "CoChairmen",
            Self::Member => "Member",
            Self::Observer => "Observer",
            Self::Watchdog => "Watchdog",
        }
    }

    /// Returns the permission set granted by the role.
    #[must_use]
    pub fn permissions(&self) -> PermissionSet {
        let shared = Permission::Suggest | Permission::PublicInfo;
        match self {
            Self::Chairmen | Self::CoChairmen => {
                Permission::Vote
                    | Permission::StartVote
                    | Permission::ConcludeVote
                    | Permission::Veto
                    | Permission::InternalInfo
                    | Permission::Suggest
            }
            Self::Member => shared | Permission::Vote,
            Self::Observer => shared,
            Self::Watchdog => shared | Permission::InternalInfo,
        }
    }

    /// Returns whether the role is exclusive.
    #[must_use]
    pub fn unique(&self) -> bool {
        matches!(self, Self::Chairmen | Self::CoChairmen | Self::Watchdog)
    }

    /// Builds the role entity.
    #[must_use]
    pub fn to_role(&self) -> Role {
        Role {
            id: self.role_id(),
            name: NonEmptyString::from_static(self.name()),
            permissions: self.permissions(),
            unique: self.unique(),
            timeout_seconds: 0,
            cascade: false,
            builtin: true,
        }
    }
}
