use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::{AuthorizationRepository, RoleRepository, RoleTransaction};
use council_core::{AppError, AppResult};
use council_domain::{BuiltinRole, PermissionSet, Role, RoleBinding, RoleId};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct RoleState {
    roles: HashMap<RoleId, Role>,
    bindings: BTreeMap<(String, RoleId), RoleBinding>,
}

/// In-memory role repository seeded with the built-in roles.
///
/// Transactions hold the store lock until they commit or drop, so they are
/// serialised against each other and against reads.
#[derive(Debug, Clone)]
pub struct InMemoryRoleRepository {
    state: Arc<Mutex<RoleState>>,
}

impl InMemoryRoleRepository {
    /// Creates a repository holding only the built-in roles.
    #[must_use]
    pub fn new() -> Self {
        let roles = BuiltinRole::all()
            .iter()
            .map(|builtin| (builtin.role_id(), builtin.to_role()))
            .collect();

        Self {
            state: Arc::new(Mutex::new(RoleState {
                roles,
                bindings: BTreeMap::new(),
            })),
        }
    }
}

impl Default for InMemoryRoleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationRepository for InMemoryRoleRepository {
    async fn list_role_permissions_for_subject(
        &self,
        subject: &str,
    ) -> AppResult<Vec<PermissionSet>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .values()
            .filter(|binding| binding.user_id == subject)
            .filter_map(|binding| state.roles.get(&binding.role_id))
            .map(Role::permissions)
            .collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|left, right| {
            right
                .is_builtin()
                .cmp(&left.is_builtin())
                .then_with(|| left.name().as_str().cmp(right.name().as_str()))
        });

        Ok(roles)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.roles.contains_key(&role.id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.id()
            )));
        }

        state.roles.insert(role.id(), role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match state.roles.get_mut(&role.id()) {
            Some(existing) if !existing.is_builtin() => {
                *existing = role.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "role '{}' does not exist or is built-in",
                role.id()
            ))),
        }
    }

    async fn list_roles_for_user(&self, user_id: &str) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .values()
            .filter(|binding| binding.user_id == user_id)
            .filter_map(|binding| state.roles.get(&binding.role_id).cloned())
            .collect())
    }

    async fn list_expired_bindings(&self, now: DateTime<Utc>) -> AppResult<Vec<RoleBinding>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .values()
            .filter(|binding| {
                state
                    .roles
                    .get(&binding.role_id)
                    .and_then(|role| role.binding_expires_at(binding.issued_at))
                    .is_some_and(|expires_at| expires_at <= now)
            })
            .cloned()
            .collect())
    }

    async fn begin(&self) -> AppResult<Box<dyn RoleTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryRoleTransaction { guard, staged }))
    }
}

struct InMemoryRoleTransaction {
    guard: OwnedMutexGuard<RoleState>,
    staged: RoleState,
}

#[async_trait]
impl RoleTransaction for InMemoryRoleTransaction {
    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.staged.roles.get(&role_id).cloned())
    }

    async fn find_binding(
        &mut self,
        user_id: &str,
        role_id: RoleId,
    ) -> AppResult<Option<RoleBinding>> {
        Ok(self
            .staged
            .bindings
            .get(&(user_id.to_owned(), role_id))
            .cloned())
    }

    async fn list_bindings_for_role(&mut self, role_id: RoleId) -> AppResult<Vec<RoleBinding>> {
        Ok(self
            .staged
            .bindings
            .values()
            .filter(|binding| binding.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn list_issued_bindings(
        &mut self,
        issuer_id: &str,
        issuer_role_id: RoleId,
    ) -> AppResult<Vec<RoleBinding>> {
        Ok(self
            .staged
            .bindings
            .values()
            .filter(|binding| {
                binding.issuer_id.as_deref() == Some(issuer_id)
                    && binding.issuer_role_id == Some(issuer_role_id)
            })
            .cloned()
            .collect())
    }

    async fn delete_binding(&mut self, user_id: &str, role_id: RoleId) -> AppResult<bool> {
        Ok(self
            .staged
            .bindings
            .remove(&(user_id.to_owned(), role_id))
            .is_some())
    }

    async fn upsert_binding(&mut self, binding: &RoleBinding) -> AppResult<()> {
        if !self.staged.roles.contains_key(&binding.role_id) {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                binding.role_id
            )));
        }

        self.staged
            .bindings
            .insert((binding.user_id.clone(), binding.role_id), binding.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
