//! Role definitions, assignment, explicit removal and expiry.

mod cascade;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_core::{AppError, AppResult, Identity};
use council_domain::{
    Permission, PermissionSet, Role, RoleBinding, RoleChangeReason, RoleDraft, RoleId,
    RoleUpdateType,
};
use tracing::{debug, info, warn};

use crate::governance_events::publish_all;
use crate::{
    AuthorizationService, EventPublisher, GovernanceEvent, RoleRepository, RoleUpdate, SweepJob,
    SweepReport,
};

use cascade::revoke_with_cascade;

/// Tunables of role revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSettings {
    /// Maximum issuance depth followed by cascade revocation.
    pub cascade_max_depth: usize,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            cascade_max_depth: 32,
        }
    }
}

/// Input payload for assigning a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// Future holder.
    pub user_id: String,
    /// Role to grant.
    pub role_id: RoleId,
    /// Whether a unique role moves from its current holder.
    pub is_transferal: bool,
    /// Role of the actor through which the grant is issued.
    pub issuer_role_id: Option<RoleId>,
}

/// Application service for roles and role bindings.
#[derive(Clone)]
pub struct RoleService {
    repository: Arc<dyn RoleRepository>,
    authorization_service: AuthorizationService,
    event_publisher: Arc<dyn EventPublisher>,
    settings: RoleSettings,
}

impl RoleService {
    /// Creates a new role service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        authorization_service: AuthorizationService,
        event_publisher: Arc<dyn EventPublisher>,
        settings: RoleSettings,
    ) -> Self {
        Self {
            repository,
            authorization_service,
            event_publisher,
            settings,
        }
    }

    /// Lists every role.
    pub async fn list_roles(&self, actor: &Identity) -> AppResult<Vec<Role>> {
        self.authorization_service.require_info_access(actor).await?;
        self.repository.list_roles().await
    }

    /// Returns one role.
    pub async fn find_role(&self, actor: &Identity, role_id: RoleId) -> AppResult<Role> {
        self.authorization_service.require_info_access(actor).await?;
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    /// Lists the roles bound to a user.
    pub async fn list_user_roles(&self, actor: &Identity, user_id: &str) -> AppResult<Vec<Role>> {
        self.authorization_service.require_info_access(actor).await?;
        self.repository.list_roles_for_user(user_id).await
    }

    /// Returns the effective permissions of a user.
    pub async fn user_permissions(
        &self,
        actor: &Identity,
        user_id: &str,
    ) -> AppResult<PermissionSet> {
        self.authorization_service.require_info_access(actor).await?;
        self.authorization_service
            .effective_permissions(user_id)
            .await
    }

    /// Checks a role definition without persisting it.
    pub async fn validate_role(&self, actor: &Identity, draft: RoleDraft) -> AppResult<()> {
        self.authorization_service
            .require_administrative_permission(actor, Permission::CreateRole)
            .await?;

        Role::from_draft(RoleId::new(), draft).map(|_| ())
    }

    /// Creates a dynamic role.
    pub async fn create_role(&self, actor: &Identity, draft: RoleDraft) -> AppResult<Role> {
        self.authorization_service
            .require_administrative_permission(actor, Permission::CreateRole)
            .await?;

        let role = Role::from_draft(RoleId::new(), draft)?;
        self.repository.create_role(&role).await?;

        info!(role_id = %role.id(), subject = %actor.subject(), "role created");
        Ok(role)
    }

    /// Replaces the definition of a dynamic role.
    pub async fn modify_role(
        &self,
        actor: &Identity,
        role_id: RoleId,
        draft: RoleDraft,
    ) -> AppResult<Role> {
        self.authorization_service
            .require_administrative_permission(actor, Permission::CreateRole)
            .await?;

        let role = Role::from_draft(role_id, draft)?;
        let existing = self
            .repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;

        if existing.is_builtin() {
            return Err(AppError::Conflict(format!(
                "built-in role '{}' cannot be modified",
                existing.name()
            )));
        }

        self.repository.update_role(&role).await?;

        info!(role_id = %role_id, subject = %actor.subject(), "role modified");
        Ok(role)
    }

    /// Grants a role to a user.
    pub async fn assign_role(
        &self,
        actor: &Identity,
        input: AssignRoleInput,
    ) -> AppResult<RoleBinding> {
        self.assign_role_at(actor, input, Utc::now()).await
    }

    /// Grants a role to a user as of `now`.
    ///
    /// Transfers of a unique role revoke every current holder and insert the
    /// new binding in one transaction.
    pub async fn assign_role_at(
        &self,
        actor: &Identity,
        input: AssignRoleInput,
        now: DateTime<Utc>,
    ) -> AppResult<RoleBinding> {
        self.authorization_service
            .require_administrative_permission(actor, Permission::AssignRole)
            .await?;

        let mut transaction = self.repository.begin().await?;
        let role = transaction
            .find_role(input.role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{}' does not exist", input.role_id))
            })?;

        if let Some(issuer_role_id) = input.issuer_role_id
            && transaction
                .find_binding(actor.subject(), issuer_role_id)
                .await?
                .is_none()
        {
            return Err(AppError::Forbidden(format!(
                "subject '{}' does not hold issuing role '{issuer_role_id}'",
                actor.subject()
            )));
        }

        let mut updates = Vec::new();
        if role.unique() {
            if !input.is_transferal {
                return Err(AppError::Conflict(format!(
                    "role '{}' is unique and can only be assigned by transfer",
                    role.name()
                )));
            }

            let holders = transaction.list_bindings_for_role(role.id()).await?;
            for holder in holders {
                let removed = revoke_with_cascade(
                    transaction.as_mut(),
                    &holder,
                    RoleChangeReason::Transferal,
                    None,
                    self.settings.cascade_max_depth,
                )
                .await?;
                updates.extend(removed);
            }
        }

        let binding = RoleBinding {
            user_id: input.user_id,
            role_id: role.id(),
            issuer_id: Some(actor.subject().to_owned()),
            issuer_role_id: input.issuer_role_id,
            issued_at: now,
        };
        transaction.upsert_binding(&binding).await?;
        transaction.commit().await?;

        updates.push(RoleUpdate {
            role_id: binding.role_id,
            user_id: binding.user_id.clone(),
            update_type: RoleUpdateType::Added,
            reason: if input.is_transferal {
                RoleChangeReason::Transferal
            } else {
                RoleChangeReason::None
            },
            is_cascading: false,
            removed_by: None,
        });

        info!(
            role_id = %binding.role_id,
            user_id = %binding.user_id,
            subject = %actor.subject(),
            "role assigned"
        );
        self.publish_updates(updates).await;

        Ok(binding)
    }

    /// Removes a role binding explicitly, cascading where the role requires.
    ///
    /// Returns the number of bindings removed.
    pub async fn remove_role(
        &self,
        actor: &Identity,
        user_id: &str,
        role_id: RoleId,
    ) -> AppResult<usize> {
        self.authorization_service
            .require_administrative_permission(actor, Permission::RemoveRole)
            .await?;

        let mut transaction = self.repository.begin().await?;
        let binding = transaction
            .find_binding(user_id, role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' does not hold role '{role_id}'"
                ))
            })?;

        let updates = revoke_with_cascade(
            transaction.as_mut(),
            &binding,
            RoleChangeReason::RemovedByUser,
            Some(actor.subject()),
            self.settings.cascade_max_depth,
        )
        .await?;
        transaction.commit().await?;

        let removed = updates.len();
        info!(
            role_id = %role_id,
            user_id = %user_id,
            subject = %actor.subject(),
            removed,
            "role removed"
        );
        self.publish_updates(updates).await;

        Ok(removed)
    }

    /// Revokes every binding whose grant window elapsed at `now`.
    ///
    /// Each binding is revoked in its own transaction; a failure is logged and
    /// the pass continues.
    pub async fn expire_bindings(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let expired = self.repository.list_expired_bindings(now).await?;
        let mut report = SweepReport::default();

        for binding in expired {
            match self.expire_binding(&binding, now).await {
                Ok(updates) => {
                    report.processed += 1;
                    self.publish_updates(updates).await;
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        user_id = %binding.user_id,
                        role_id = %binding.role_id,
                        error = %error,
                        "failed to expire role binding"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn expire_binding(
        &self,
        binding: &RoleBinding,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleUpdate>> {
        let mut transaction = self.repository.begin().await?;

        let Some(role) = transaction.find_role(binding.role_id).await? else {
            return Ok(Vec::new());
        };
        let Some(current) = transaction
            .find_binding(&binding.user_id, binding.role_id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let still_expired = role
            .binding_expires_at(current.issued_at)
            .is_some_and(|expires_at| expires_at <= now);
        if !still_expired {
            debug!(
                user_id = %current.user_id,
                role_id = %current.role_id,
                "binding was renewed before expiry"
            );
            return Ok(Vec::new());
        }

        let updates = revoke_with_cascade(
            transaction.as_mut(),
            &current,
            RoleChangeReason::Timeout,
            None,
            self.settings.cascade_max_depth,
        )
        .await?;
        transaction.commit().await?;

        Ok(updates)
    }

    async fn publish_updates(&self, updates: Vec<RoleUpdate>) {
        publish_all(
            self.event_publisher.as_ref(),
            updates.into_iter().map(GovernanceEvent::RoleUpdated),
        )
        .await;
    }
}

#[async_trait]
impl SweepJob for RoleService {
    fn name(&self) -> &'static str {
        "role_expiry"
    }

    async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        self.expire_bindings(now).await
    }
}

#[cfg(test)]
mod tests;
