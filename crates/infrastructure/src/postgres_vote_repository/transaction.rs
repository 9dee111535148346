use async_trait::async_trait;
use council_application::{PositionRecord, VoteTransaction};
use council_core::{AppError, AppResult};
use council_domain::{Position, Vote, VoteId};
use sqlx::{Postgres, Transaction};

use super::{DetailColumns, PositionRow, VoteRow, decode_positions};

/// Vote unit of work over one PostgreSQL transaction.
pub(super) struct PostgresVoteTransaction {
    transaction: Transaction<'static, Postgres>,
}

impl PostgresVoteTransaction {
    pub(super) fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self { transaction }
    }
}

#[async_trait]
impl VoteTransaction for PostgresVoteTransaction {
    async fn find_vote(&mut self, vote_id: VoteId) -> AppResult<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(
            r#"
            SELECT id, name, description, kind, has_abstain, is_private, state, deadline,
                created_at, vetoed_by, veto_reason, successor_vote_id, succeeded
            FROM votes
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(vote_id.value())
        .fetch_optional(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock vote '{vote_id}': {error}")))?;

        row.map(Vote::try_from).transpose()
    }

    async fn next_vote_id(&mut self) -> AppResult<VoteId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT nextval(pg_get_serial_sequence('votes', 'id'))
            "#,
        )
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reserve vote id: {error}")))?;

        Ok(VoteId::new(id))
    }

    async fn insert_vote(&mut self, vote: &Vote) -> AppResult<()> {
        let detail = DetailColumns::of(vote);

        sqlx::query(
            r#"
            INSERT INTO votes (
                id, name, description, kind, has_abstain, is_private, state, deadline,
                created_at, vetoed_by, veto_reason, successor_vote_id, succeeded
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(vote.id().value())
        .bind(vote.name().as_str())
        .bind(vote.description())
        .bind(vote.kind().as_str())
        .bind(vote.has_abstain())
        .bind(vote.is_private())
        .bind(vote.state().as_str())
        .bind(vote.deadline())
        .bind(vote.created_at())
        .bind(detail.vetoed_by)
        .bind(detail.veto_reason)
        .bind(detail.successor_vote_id)
        .bind(detail.succeeded)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert vote '{}': {error}", vote.id()))
        })?;

        Ok(())
    }

    async fn save_vote(&mut self, vote: &Vote) -> AppResult<()> {
        let detail = DetailColumns::of(vote);

        let result = sqlx::query(
            r#"
            UPDATE votes
            SET state = $2,
                is_private = $3,
                vetoed_by = $4,
                veto_reason = $5,
                successor_vote_id = $6,
                succeeded = $7
            WHERE id = $1
            "#,
        )
        .bind(vote.id().value())
        .bind(vote.state().as_str())
        .bind(vote.is_private())
        .bind(detail.vetoed_by)
        .bind(detail.veto_reason)
        .bind(detail.successor_vote_id)
        .bind(detail.succeeded)
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save vote '{}': {error}", vote.id()))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "vote '{}' does not exist",
                vote.id()
            )));
        }

        Ok(())
    }

    async fn upsert_position(
        &mut self,
        vote_id: VoteId,
        user_id: &str,
        position: Position,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vote_positions (vote_id, user_id, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (vote_id, user_id) DO UPDATE
            SET position = EXCLUDED.position
            "#,
        )
        .bind(vote_id.value())
        .bind(user_id)
        .bind(position.as_str())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record position of '{user_id}' on vote '{vote_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn list_positions(&mut self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT user_id, position
            FROM vote_positions
            WHERE vote_id = $1
            ORDER BY cast_at, user_id
            "#,
        )
        .bind(vote_id.value())
        .fetch_all(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list positions of vote '{vote_id}': {error}"))
        })?;

        decode_positions(rows)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit vote transaction: {error}"))
        })
    }
}
