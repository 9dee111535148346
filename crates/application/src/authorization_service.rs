use std::sync::Arc;

use council_core::{AppError, AppResult, Identity};
use council_domain::{Permission, PermissionSet};

use crate::AuthorizationRepository;

/// Application service for permission checks.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Returns the union of the permissions of every role bound to `subject`.
    pub async fn effective_permissions(&self, subject: &str) -> AppResult<PermissionSet> {
        let sets = self
            .repository
            .list_role_permissions_for_subject(subject)
            .await?;

        Ok(sets.into_iter().fold(PermissionSet::empty(), PermissionSet::union))
    }

    /// Returns whether every permission of `required` is granted to `subject`.
    pub async fn has_permission(&self, subject: &str, required: PermissionSet) -> AppResult<bool> {
        Ok(self.effective_permissions(subject).await?.contains(required))
    }

    /// Ensures a subject holds a permission.
    pub async fn require_permission(&self, subject: &str, permission: Permission) -> AppResult<()> {
        if self.has_permission(subject, permission.into()).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{subject}' is missing permission '{}'",
            permission.as_str()
        )))
    }

    /// Ensures a subject holds at least one of the listed permissions.
    pub async fn require_any_permission(
        &self,
        subject: &str,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let effective = self.effective_permissions(subject).await?;
        if permissions
            .iter()
            .any(|permission| effective.has(*permission))
        {
            return Ok(());
        }

        let names: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
        Err(AppError::Forbidden(format!(
            "subject '{subject}' needs one of the permissions [{}]",
            names.join(", ")
        )))
    }

    /// Ensures an actor may perform an administrative operation.
    ///
    /// The first-party bot may always administer; other callers need the
    /// matching permission.
    pub async fn require_administrative_permission(
        &self,
        actor: &Identity,
        permission: Permission,
    ) -> AppResult<()> {
        if actor.is_first_party() {
            return Ok(());
        }

        self.require_permission(actor.subject(), permission).await
    }

    /// Ensures an actor may read governance information.
    pub async fn require_info_access(&self, actor: &Identity) -> AppResult<()> {
        if actor.is_first_party() {
            return Ok(());
        }

        self.require_any_permission(
            actor.subject(),
            &[Permission::PublicInfo, Permission::InternalInfo],
        )
        .await
    }
}
