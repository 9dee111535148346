use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::{PositionRecord, VoteRepository, VoteTransaction};
use council_core::{AppError, AppResult, NonEmptyString};
use council_domain::{Position, Vote, VoteId, VoteKind, VoteState, VoteStateDetail};
use sqlx::{FromRow, PgPool};

mod transaction;

use transaction::PostgresVoteTransaction;

/// PostgreSQL-backed repository for votes and positions.
#[derive(Clone)]
pub struct PostgresVoteRepository {
    pool: PgPool,
}

impl PostgresVoteRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct VoteRow {
    id: i64,
    name: String,
    description: String,
    kind: String,
    has_abstain: bool,
    is_private: bool,
    state: String,
    deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    vetoed_by: Option<String>,
    veto_reason: Option<String>,
    successor_vote_id: Option<i64>,
    succeeded: Option<bool>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = AppError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        let detail = match (row.successor_vote_id, row.vetoed_by, row.succeeded) {
            (Some(successor_vote_id), _, _) => Some(VoteStateDetail::Inconclusive {
                successor_vote_id: VoteId::new(successor_vote_id),
            }),
            (None, Some(vetoed_by), _) => Some(VoteStateDetail::Veto {
                vetoed_by,
                reason: row.veto_reason.unwrap_or_default(),
            }),
            (None, None, Some(succeeded)) => Some(VoteStateDetail::Decision { succeeded }),
            (None, None, None) => None,
        };

        let decode = |error: AppError| {
            AppError::Internal(format!("failed to decode vote '{}': {error}", row.id))
        };

        Ok(Vote::restore(
            VoteId::new(row.id),
            NonEmptyString::new(row.name).map_err(decode)?,
            row.description,
            VoteKind::from_str(row.kind.as_str()).map_err(decode)?,
            row.has_abstain,
            row.is_private,
            VoteState::from_str(row.state.as_str()).map_err(decode)?,
            row.deadline,
            row.created_at,
            detail,
        ))
    }
}

#[derive(Debug, FromRow)]
struct PositionRow {
    user_id: String,
    position: String,
}

fn decode_positions(rows: Vec<PositionRow>) -> AppResult<Vec<PositionRecord>> {
    rows.into_iter()
        .map(|row| -> AppResult<PositionRecord> {
            Ok(PositionRecord {
                position: Position::from_str(row.position.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode position of '{}': {error}",
                        row.user_id
                    ))
                })?,
                user_id: row.user_id,
            })
        })
        .collect()
}

/// Column values persisted for a vote's terminal detail.
struct DetailColumns<'a> {
    vetoed_by: Option<&'a str>,
    veto_reason: Option<&'a str>,
    successor_vote_id: Option<i64>,
    succeeded: Option<bool>,
}

impl<'a> DetailColumns<'a> {
    fn of(vote: &'a Vote) -> Self {
        let mut columns = Self {
            vetoed_by: None,
            veto_reason: None,
            successor_vote_id: None,
            succeeded: None,
        };

        match vote.detail() {
            Some(VoteStateDetail::Veto { vetoed_by, reason }) => {
                columns.vetoed_by = Some(vetoed_by.as_str());
                columns.veto_reason = Some(reason.as_str());
            }
            Some(VoteStateDetail::Inconclusive { successor_vote_id }) => {
                columns.successor_vote_id = Some(successor_vote_id.value());
            }
            Some(VoteStateDetail::Decision { succeeded }) => {
                columns.succeeded = Some(*succeeded);
            }
            None => {}
        }

        columns
    }
}

#[async_trait]
impl VoteRepository for PostgresVoteRepository {
    async fn find_vote(&self, vote_id: VoteId) -> AppResult<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(
            r#"
            SELECT id, name, description, kind, has_abstain, is_private, state, deadline,
                created_at, vetoed_by, veto_reason, successor_vote_id, succeeded
            FROM votes
            WHERE id = $1
            "#,
        )
        .bind(vote_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find vote '{vote_id}': {error}")))?;

        row.map(Vote::try_from).transpose()
    }

    async fn list_due_votes(&self, now: DateTime<Utc>) -> AppResult<Vec<VoteId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM votes
            WHERE state = 'ongoing' AND deadline <= $1
            ORDER BY deadline, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list due votes: {error}")))?;

        Ok(ids.into_iter().map(VoteId::new).collect())
    }

    async fn list_positions(&self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT user_id, position
            FROM vote_positions
            WHERE vote_id = $1
            ORDER BY cast_at, user_id
            "#,
        )
        .bind(vote_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list positions of vote '{vote_id}': {error}"))
        })?;

        decode_positions(rows)
    }

    async fn begin(&self) -> AppResult<Box<dyn VoteTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start vote transaction: {error}"))
        })?;

        Ok(Box::new(PostgresVoteTransaction::new(transaction)))
    }
}
