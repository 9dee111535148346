use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::{AuthorizationRepository, RoleRepository, RoleTransaction};
use council_core::{AppError, AppResult, NonEmptyString};
use council_domain::{PermissionSet, Role, RoleBinding, RoleId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

mod transaction;

use transaction::PostgresRoleTransaction;

/// PostgreSQL-backed repository for roles and role bindings.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    permissions: i64,
    unique_role: bool,
    timeout_seconds: i64,
    cascade_revocation: bool,
    is_builtin: bool,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let permissions = u64::try_from(row.permissions).map_err(|error| {
            AppError::Internal(format!("invalid permissions for role '{}': {error}", row.id))
        })?;
        let timeout_seconds = u64::try_from(row.timeout_seconds).map_err(|error| {
            AppError::Internal(format!("invalid timeout for role '{}': {error}", row.id))
        })?;

        Ok(Role::restore(
            RoleId::from_uuid(row.id),
            NonEmptyString::new(row.name)?,
            PermissionSet::from_bits(permissions),
            row.unique_role,
            timeout_seconds,
            row.cascade_revocation,
            row.is_builtin,
        ))
    }
}

#[derive(Debug, FromRow)]
struct RoleBindingRow {
    user_id: String,
    role_id: Uuid,
    issuer_id: Option<String>,
    issuer_role_id: Option<Uuid>,
    issued_at: DateTime<Utc>,
}

impl From<RoleBindingRow> for RoleBinding {
    fn from(row: RoleBindingRow) -> Self {
        Self {
            user_id: row.user_id,
            role_id: RoleId::from_uuid(row.role_id),
            issuer_id: row.issuer_id,
            issuer_role_id: row.issuer_role_id.map(RoleId::from_uuid),
            issued_at: row.issued_at,
        }
    }
}

fn role_columns(role: &Role) -> AppResult<(i64, i64)> {
    let permissions = i64::try_from(role.permissions().bits()).map_err(|error| {
        AppError::Validation(format!("permissions of role '{}' out of range: {error}", role.id()))
    })?;
    let timeout_seconds = i64::try_from(role.timeout_seconds()).map_err(|error| {
        AppError::Validation(format!("timeout of role '{}' out of range: {error}", role.id()))
    })?;

    Ok((permissions, timeout_seconds))
}

fn decode_roles(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    rows.into_iter().map(Role::try_from).collect()
}

#[async_trait]
impl AuthorizationRepository for PostgresRoleRepository {
    async fn list_role_permissions_for_subject(
        &self,
        subject: &str,
    ) -> AppResult<Vec<PermissionSet>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT roles.permissions
            FROM role_bindings AS bindings
            INNER JOIN roles ON roles.id = bindings.role_id
            WHERE bindings.user_id = $1
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        rows.into_iter()
            .map(|bits| {
                u64::try_from(bits)
                    .map(PermissionSet::from_bits)
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "failed to decode permissions for subject '{subject}': {error}"
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, permissions, unique_role, timeout_seconds, cascade_revocation, is_builtin
            FROM roles
            ORDER BY is_builtin DESC, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        decode_roles(rows)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, permissions, unique_role, timeout_seconds, cascade_revocation, is_builtin
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role '{role_id}': {error}")))?;

        row.map(Role::try_from).transpose()
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        let (permissions, timeout_seconds) = role_columns(role)?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, permissions, unique_role, timeout_seconds, cascade_revocation, is_builtin)
            VALUES ($1, $2, $3, $4, $5, $6, false)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(permissions)
        .bind(role.unique())
        .bind(timeout_seconds)
        .bind(role.cascade())
        .execute(&self.pool)
        .await
        .map_err(|error| map_role_conflict(error, role))?;

        Ok(())
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        let (permissions, timeout_seconds) = role_columns(role)?;

        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2,
                permissions = $3,
                unique_role = $4,
                timeout_seconds = $5,
                cascade_revocation = $6
            WHERE id = $1 AND is_builtin = false
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(permissions)
        .bind(role.unique())
        .bind(timeout_seconds)
        .bind(role.cascade())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update role '{}': {error}", role.id()))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist or is built-in",
                role.id()
            )));
        }

        Ok(())
    }

    async fn list_roles_for_user(&self, user_id: &str) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT roles.id, roles.name, roles.permissions, roles.unique_role,
                roles.timeout_seconds, roles.cascade_revocation, roles.is_builtin
            FROM role_bindings AS bindings
            INNER JOIN roles ON roles.id = bindings.role_id
            WHERE bindings.user_id = $1
            ORDER BY roles.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list roles of user '{user_id}': {error}"))
        })?;

        decode_roles(rows)
    }

    async fn list_expired_bindings(&self, now: DateTime<Utc>) -> AppResult<Vec<RoleBinding>> {
        let rows = sqlx::query_as::<_, RoleBindingRow>(
            r#"
            SELECT bindings.user_id, bindings.role_id, bindings.issuer_id,
                bindings.issuer_role_id, bindings.issued_at
            FROM role_bindings AS bindings
            INNER JOIN roles ON roles.id = bindings.role_id
            WHERE roles.timeout_seconds > 0
                AND bindings.issued_at + make_interval(secs => roles.timeout_seconds) <= $1
            ORDER BY bindings.issued_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list expired role bindings: {error}"))
        })?;

        Ok(rows.into_iter().map(RoleBinding::from).collect())
    }

    async fn begin(&self) -> AppResult<Box<dyn RoleTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start role transaction: {error}"))
        })?;

        Ok(Box::new(PostgresRoleTransaction::new(transaction)))
    }
}

fn map_role_conflict(error: sqlx::Error, role: &Role) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{}' already exists", role.id()));
    }

    AppError::Internal(format!("failed to create role: {error}"))
}
