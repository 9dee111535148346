use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use council_core::{AppError, AppResult, Identity, IssuerTag};
use council_domain::{
    BuiltinRole, Permission, PermissionSet, Role, RoleBinding, RoleChangeReason, RoleDraft,
    RoleId, RoleUpdateType,
};
use tokio::sync::Mutex;

use crate::{
    AuthorizationRepository, AuthorizationService, EventPublisher, GovernanceEvent,
    RoleRepository, RoleTransaction, RoleUpdate,
};

use super::{AssignRoleInput, RoleService, RoleSettings};

#[derive(Clone, Default)]
struct FakeState {
    roles: BTreeMap<RoleId, Role>,
    bindings: BTreeMap<(String, RoleId), RoleBinding>,
    undeletable: BTreeSet<String>,
}

#[derive(Clone, Default)]
struct FakeRoleStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRoleStore {
    async fn seed_role(&self, role: Role) {
        self.state.lock().await.roles.insert(role.id(), role);
    }

    async fn seed_binding(&self, binding: RoleBinding) {
        self.state
            .lock()
            .await
            .bindings
            .insert((binding.user_id.clone(), binding.role_id), binding);
    }

    async fn fail_deletes_for(&self, user_id: &str) {
        self.state
            .lock()
            .await
            .undeletable
            .insert(user_id.to_owned());
    }

    async fn bindings(&self) -> Vec<RoleBinding> {
        self.state.lock().await.bindings.values().cloned().collect()
    }
}

#[async_trait]
impl AuthorizationRepository for FakeRoleStore {
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
impl RoleRepository for FakeRoleStore {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.state.lock().await.roles.values().cloned().collect())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        self.seed_role(role.clone()).await;
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        self.seed_role(role.clone()).await;
        Ok(())
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
        let staged = self.state.lock().await.clone();
        Ok(Box::new(FakeRoleTransaction {
            store: self.state.clone(),
            staged,
        }))
    }
}

struct FakeRoleTransaction {
    store: Arc<Mutex<FakeState>>,
    staged: FakeState,
}

#[async_trait]
impl RoleTransaction for FakeRoleTransaction {
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
        if self.staged.undeletable.contains(user_id) {
            return Err(AppError::Internal(format!(
                "storage refused to delete binding of '{user_id}'"
            )));
        }

        Ok(self
            .staged
            .bindings
            .remove(&(user_id.to_owned(), role_id))
            .is_some())
    }

    async fn upsert_binding(&mut self, binding: &RoleBinding) -> AppResult<()> {
        self.staged
            .bindings
            .insert((binding.user_id.clone(), binding.role_id), binding.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        *self.store.lock().await = self.staged;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<GovernanceEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: GovernanceEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

impl RecordingPublisher {
    async fn role_updates(&self) -> Vec<RoleUpdate> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                GovernanceEvent::RoleUpdated(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }
}

struct Harness {
    service: RoleService,
    store: FakeRoleStore,
    publisher: Arc<RecordingPublisher>,
}

async fn harness(max_depth: usize) -> Harness {
    let store = FakeRoleStore::default();
    for builtin in BuiltinRole::all() {
        store.seed_role(builtin.to_role()).await;
    }
    let publisher = Arc::new(RecordingPublisher::default());
    let service = RoleService::new(
        Arc::new(store.clone()),
        AuthorizationService::new(Arc::new(store.clone())),
        publisher.clone(),
        RoleSettings {
            cascade_max_depth: max_depth,
        },
    );

    Harness {
        service,
        store,
        publisher,
    }
}

fn bot() -> Identity {
    Identity::new("bot", IssuerTag::GovBot)
}

fn draft(name: &str, cascade: bool) -> RoleDraft {
    RoleDraft {
        name: name.to_owned(),
        permissions: PermissionSet::from(Permission::Suggest),
        unique: false,
        timeout_seconds: 3600,
        cascade,
    }
}

fn binding(
    user_id: &str,
    role_id: RoleId,
    issuer: Option<(&str, RoleId)>,
    issued_at: DateTime<Utc>,
) -> RoleBinding {
    RoleBinding {
        user_id: user_id.to_owned(),
        role_id,
        issuer_id: issuer.map(|(issuer_id, _)| issuer_id.to_owned()),
        issuer_role_id: issuer.map(|(_, issuer_role_id)| issuer_role_id),
        issued_at,
    }
}

#[tokio::test]
async fn create_role_rejects_zero_timeout() {
    let harness = harness(32).await;
    let mut never_expiring = draft("Auditor", false);
    never_expiring.timeout_seconds = 0;

    let result = harness.service.create_role(&bot(), never_expiring).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn create_role_requires_permission_for_foreign_callers() {
    let harness = harness(32).await;
    let stranger = Identity::new("mallory", IssuerTag::Foreign);

    let result = harness
        .service
        .create_role(&stranger, draft("Auditor", false))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn validate_role_never_persists() {
    let harness = harness(32).await;
    let before = harness.store.state.lock().await.roles.len();

    let result = harness
        .service
        .validate_role(&bot(), draft("Auditor", false))
        .await;
    assert!(result.is_ok());
    assert_eq!(harness.store.state.lock().await.roles.len(), before);
}

#[tokio::test]
async fn builtin_roles_cannot_be_modified() {
    let harness = harness(32).await;
    let result = harness
        .service
        .modify_role(&bot(), BuiltinRole::Member.role_id(), draft("Member", false))
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn modify_role_replaces_definition() {
    let harness = harness(32).await;
    let created = harness
        .service
        .create_role(&bot(), draft("Auditor", false))
        .await
        .unwrap_or_else(|_| unreachable!());

    let mut replacement = draft("Senior auditor", true);
    replacement.timeout_seconds = 7200;
    let modified = harness
        .service
        .modify_role(&bot(), created.id(), replacement)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(modified.name().as_str(), "Senior auditor");
    assert!(modified.cascade());
    let stored = harness.store.find_role(created.id()).await;
    assert_eq!(stored.ok().flatten(), Some(modified));
}

#[tokio::test]
async fn unique_role_without_transfer_is_rejected() {
    let harness = harness(32).await;
    let result = harness
        .service
        .assign_role(
            &bot(),
            AssignRoleInput {
                user_id: "alice".to_owned(),
                role_id: BuiltinRole::Chairmen.role_id(),
                is_transferal: false,
                issuer_role_id: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(harness.store.bindings().await.is_empty());
}

#[tokio::test]
async fn transfer_leaves_single_holder() {
    let harness = harness(32).await;
    let chair = BuiltinRole::Chairmen.role_id();
    harness
        .store
        .seed_binding(binding("alice", chair, None, Utc::now()))
        .await;

    let result = harness
        .service
        .assign_role(
            &bot(),
            AssignRoleInput {
                user_id: "bob".to_owned(),
                role_id: chair,
                is_transferal: true,
                issuer_role_id: None,
            },
        )
        .await;
    assert!(result.is_ok());

    let holders: Vec<String> = harness
        .store
        .bindings()
        .await
        .into_iter()
        .filter(|binding| binding.role_id == chair)
        .map(|binding| binding.user_id)
        .collect();
    assert_eq!(holders, vec!["bob".to_owned()]);

    let updates = harness.publisher.role_updates().await;
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].update_type, RoleUpdateType::Removed);
    assert_eq!(updates[0].reason, RoleChangeReason::Transferal);
    assert_eq!(updates[1].update_type, RoleUpdateType::Added);
}

#[tokio::test]
async fn issuing_role_must_be_held_by_actor() {
    let harness = harness(32).await;
    let actor = Identity::new("carol", IssuerTag::Foreign);
    let delegate = harness
        .service
        .create_role(
            &bot(),
            RoleDraft {
                permissions: PermissionSet::from(Permission::AssignRole),
                ..draft("Delegate", true)
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    harness
        .store
        .seed_binding(binding("carol", delegate.id(), None, Utc::now()))
        .await;

    let foreign_issuer = harness
        .service
        .assign_role(
            &actor,
            AssignRoleInput {
                user_id: "dave".to_owned(),
                role_id: BuiltinRole::Member.role_id(),
                is_transferal: false,
                issuer_role_id: Some(BuiltinRole::Observer.role_id()),
            },
        )
        .await;
    assert!(matches!(foreign_issuer, Err(AppError::Forbidden(_))));

    let issued = harness
        .service
        .assign_role(
            &actor,
            AssignRoleInput {
                user_id: "dave".to_owned(),
                role_id: BuiltinRole::Member.role_id(),
                is_transferal: false,
                issuer_role_id: Some(delegate.id()),
            },
        )
        .await;
    let Ok(issued) = issued else {
        panic!("expected binding");
    };
    assert_eq!(issued.issuer_id.as_deref(), Some("carol"));
    assert_eq!(issued.issuer_role_id, Some(delegate.id()));
}

#[tokio::test]
async fn removing_cascading_grant_revokes_issued_bindings() {
    let harness = harness(32).await;
    let parent_role = harness
        .service
        .create_role(&bot(), draft("Coordinator", true))
        .await
        .unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    harness
        .store
        .seed_binding(binding("root", parent_role.id(), None, now))
        .await;
    for child in ["c1", "c2", "c3"] {
        harness
            .store
            .seed_binding(binding(
                child,
                BuiltinRole::Member.role_id(),
                Some(("root", parent_role.id())),
                now,
            ))
            .await;
    }

    let removed = harness
        .service
        .remove_role(&bot(), "root", parent_role.id())
        .await;
    assert_eq!(removed.ok(), Some(4));
    assert!(harness.store.bindings().await.is_empty());

    let updates = harness.publisher.role_updates().await;
    assert_eq!(updates[0].reason, RoleChangeReason::RemovedByUser);
    assert_eq!(updates[0].removed_by.as_deref(), Some("bot"));
    assert!(!updates[0].is_cascading);
    let cascaded: Vec<&RoleUpdate> = updates.iter().filter(|update| update.is_cascading).collect();
    assert_eq!(cascaded.len(), 3);
    assert!(
        cascaded
            .iter()
            .all(|update| update.reason == RoleChangeReason::Cascading)
    );
}

#[tokio::test]
async fn cascade_survives_provenance_cycle() {
    let harness = harness(32).await;
    let role = harness
        .service
        .create_role(&bot(), draft("Ring", true))
        .await
        .unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    harness
        .store
        .seed_binding(binding("a", role.id(), Some(("b", role.id())), now))
        .await;
    harness
        .store
        .seed_binding(binding("b", role.id(), Some(("a", role.id())), now))
        .await;

    let removed = harness.service.remove_role(&bot(), "a", role.id()).await;
    assert_eq!(removed.ok(), Some(2));
    assert!(harness.store.bindings().await.is_empty());
}

#[tokio::test]
async fn cascade_depth_limit_stops_descent() {
    let harness = harness(1).await;
    let role = harness
        .service
        .create_role(&bot(), draft("Chain", true))
        .await
        .unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    harness
        .store
        .seed_binding(binding("a", role.id(), None, now))
        .await;
    harness
        .store
        .seed_binding(binding("b", role.id(), Some(("a", role.id())), now))
        .await;
    harness
        .store
        .seed_binding(binding("c", role.id(), Some(("b", role.id())), now))
        .await;

    let removed = harness.service.remove_role(&bot(), "a", role.id()).await;
    assert_eq!(removed.ok(), Some(2));

    let remaining: Vec<String> = harness
        .store
        .bindings()
        .await
        .into_iter()
        .map(|binding| binding.user_id)
        .collect();
    assert_eq!(remaining, vec!["c".to_owned()]);
}

#[tokio::test]
async fn expiry_sweep_revokes_elapsed_grants_only() {
    let harness = harness(32).await;
    let role = harness
        .service
        .create_role(&bot(), draft("Temporary", false))
        .await
        .unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    harness
        .store
        .seed_binding(binding("old", role.id(), None, now - Duration::hours(2)))
        .await;
    harness
        .store
        .seed_binding(binding("fresh", role.id(), None, now))
        .await;
    harness
        .store
        .seed_binding(binding(
            "member",
            BuiltinRole::Member.role_id(),
            None,
            now - Duration::days(400),
        ))
        .await;

    let report = harness.service.expire_bindings(now).await;
    let Ok(report) = report else {
        panic!("expected sweep report");
    };
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let mut remaining: Vec<String> = harness
        .store
        .bindings()
        .await
        .into_iter()
        .map(|binding| binding.user_id)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["fresh".to_owned(), "member".to_owned()]);

    let updates = harness.publisher.role_updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].reason, RoleChangeReason::Timeout);
}

#[tokio::test]
async fn expiry_sweep_continues_past_failed_binding() {
    let harness = harness(32).await;
    let role = harness
        .service
        .create_role(&bot(), draft("Temporary", false))
        .await
        .unwrap_or_else(|_| unreachable!());
    let now = Utc::now();
    for user_id in ["first", "stuck", "last"] {
        harness
            .store
            .seed_binding(binding(user_id, role.id(), None, now - Duration::hours(2)))
            .await;
    }
    harness.store.fail_deletes_for("stuck").await;

    let report = harness.service.expire_bindings(now).await;
    let Ok(report) = report else {
        panic!("expected sweep report");
    };
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);

    let remaining: Vec<String> = harness
        .store
        .bindings()
        .await
        .into_iter()
        .map(|binding| binding.user_id)
        .collect();
    assert_eq!(remaining, vec!["stuck".to_owned()]);

    let expired: BTreeSet<String> = harness
        .publisher
        .role_updates()
        .await
        .into_iter()
        .map(|update| update.user_id)
        .collect();
    assert_eq!(expired, BTreeSet::from(["first".to_owned(), "last".to_owned()]));
}
