use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_core::AppResult;
use council_domain::{Role, RoleBinding, RoleId};

/// Repository port for roles and role bindings.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists all roles, built-in ones included.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Persists a new role.
    async fn create_role(&self, role: &Role) -> AppResult<()>;

    /// Replaces an existing role by id.
    async fn update_role(&self, role: &Role) -> AppResult<()>;

    /// Lists the roles bound to a user.
    async fn list_roles_for_user(&self, user_id: &str) -> AppResult<Vec<Role>>;

    /// Lists bindings whose grant window elapsed at `now`.
    ///
    /// Bindings of roles with a zero timeout are never returned.
    async fn list_expired_bindings(&self, now: DateTime<Utc>) -> AppResult<Vec<RoleBinding>>;

    /// Opens a transaction over bindings.
    async fn begin(&self) -> AppResult<Box<dyn RoleTransaction>>;
}

/// Unit of work over role bindings.
///
/// Dropping the transaction without calling [`RoleTransaction::commit`]
/// discards every staged change.
#[async_trait]
pub trait RoleTransaction: Send {
    /// Finds a role by id, locking it for the rest of the transaction.
    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds the binding of `role_id` held by `user_id`.
    async fn find_binding(&mut self, user_id: &str, role_id: RoleId)
    -> AppResult<Option<RoleBinding>>;

    /// Lists every binding of a role.
    async fn list_bindings_for_role(&mut self, role_id: RoleId) -> AppResult<Vec<RoleBinding>>;

    /// Lists bindings issued by `issuer_id` through `issuer_role_id`.
    async fn list_issued_bindings(
        &mut self,
        issuer_id: &str,
        issuer_role_id: RoleId,
    ) -> AppResult<Vec<RoleBinding>>;

    /// Deletes a binding and returns whether it existed.
    async fn delete_binding(&mut self, user_id: &str, role_id: RoleId) -> AppResult<bool>;

    /// Inserts a binding or replaces the existing `(user_id, role_id)` pair.
    async fn upsert_binding(&mut self, binding: &RoleBinding) -> AppResult<()>;

    /// Makes every staged change visible.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
