use async_trait::async_trait;
use council_application::RoleTransaction;
use council_core::{AppError, AppResult};
use council_domain::{Role, RoleBinding, RoleId};
use sqlx::{Postgres, Transaction};

use super::{RoleBindingRow, RoleRow};

/// Role binding unit of work over one PostgreSQL transaction.
///
/// Dropping it without commit rolls the transaction back.
pub(super) struct PostgresRoleTransaction {
    transaction: Transaction<'static, Postgres>,
}

impl PostgresRoleTransaction {
    pub(super) fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self { transaction }
    }
}

#[async_trait]
impl RoleTransaction for PostgresRoleTransaction {
    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, permissions, unique_role, timeout_seconds, cascade_revocation, is_builtin
            FROM roles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role '{role_id}': {error}")))?;

        row.map(Role::try_from).transpose()
    }

    async fn find_binding(
        &mut self,
        user_id: &str,
        role_id: RoleId,
    ) -> AppResult<Option<RoleBinding>> {
        let row = sqlx::query_as::<_, RoleBindingRow>(
            r#"
            SELECT user_id, role_id, issuer_id, issuer_role_id, issued_at
            FROM role_bindings
            WHERE user_id = $1 AND role_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find binding of role '{role_id}' for user '{user_id}': {error}"
            ))
        })?;

        Ok(row.map(RoleBinding::from))
    }

    async fn list_bindings_for_role(&mut self, role_id: RoleId) -> AppResult<Vec<RoleBinding>> {
        let rows = sqlx::query_as::<_, RoleBindingRow>(
            r#"
            SELECT user_id, role_id, issuer_id, issuer_role_id, issued_at
            FROM role_bindings
            WHERE role_id = $1
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list bindings of role '{role_id}': {error}"))
        })?;

        Ok(rows.into_iter().map(RoleBinding::from).collect())
    }

    async fn list_issued_bindings(
        &mut self,
        issuer_id: &str,
        issuer_role_id: RoleId,
    ) -> AppResult<Vec<RoleBinding>> {
        let rows = sqlx::query_as::<_, RoleBindingRow>(
            r#"
            SELECT user_id, role_id, issuer_id, issuer_role_id, issued_at
            FROM role_bindings
            WHERE issuer_id = $1 AND issuer_role_id = $2
            ORDER BY user_id, role_id
            FOR UPDATE
            "#,
        )
        .bind(issuer_id)
        .bind(issuer_role_id.as_uuid())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list bindings issued by '{issuer_id}' through '{issuer_role_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(RoleBinding::from).collect())
    }

    async fn delete_binding(&mut self, user_id: &str, role_id: RoleId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_bindings
            WHERE user_id = $1 AND role_id = $2
            "#,
        )
        .bind(user_id)
        .bind(role_id.as_uuid())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete binding of role '{role_id}' for user '{user_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_binding(&mut self, binding: &RoleBinding) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO role_bindings (user_id, role_id, issuer_id, issuer_role_id, issued_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, role_id) DO UPDATE
            SET issuer_id = EXCLUDED.issuer_id,
                issuer_role_id = EXCLUDED.issuer_role_id,
                issued_at = EXCLUDED.issued_at
            "#,
        )
        .bind(binding.user_id.as_str())
        .bind(binding.role_id.as_uuid())
        .bind(binding.issuer_id.as_deref())
        .bind(binding.issuer_role_id.map(|role_id| role_id.as_uuid()))
        .bind(binding.issued_at)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to bind role '{}' to user '{}': {error}",
                binding.role_id, binding.user_id
            ))
        })?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit role transaction: {error}"))
        })
    }
}
