use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::{PositionRecord, VoteRepository, VoteTransaction};
use council_core::{AppError, AppResult};
use council_domain::{Position, Vote, VoteId};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct VoteState {
    last_id: i64,
    votes: BTreeMap<VoteId, Vote>,
    positions: BTreeMap<VoteId, Vec<PositionRecord>>,
}

impl VoteState {
    fn positions_of(&self, vote_id: VoteId) -> Vec<PositionRecord> {
        self.positions.get(&vote_id).cloned().unwrap_or_default()
    }
}

/// In-memory vote repository.
///
/// Positions keep their first-cast order; a re-cast replaces the choice in place.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVoteRepository {
    state: Arc<Mutex<VoteState>>,
}

impl InMemoryVoteRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn find_vote(&self, vote_id: VoteId) -> AppResult<Option<Vote>> {
        Ok(self.state.lock().await.votes.get(&vote_id).cloned())
    }

    async fn list_due_votes(&self, now: DateTime<Utc>) -> AppResult<Vec<VoteId>> {
        Ok(self
            .state
            .lock()
            .await
            .votes
            .values()
            .filter(|vote| vote.is_due(now))
            .map(Vote::id)
            .collect())
    }

    async fn list_positions(&self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>> {
        Ok(self.state.lock().await.positions_of(vote_id))
    }

    async fn begin(&self) -> AppResult<Box<dyn VoteTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryVoteTransaction { guard, staged }))
    }
}

struct InMemoryVoteTransaction {
    guard: OwnedMutexGuard<VoteState>,
    staged: VoteState,
}

#[async_trait]
impl VoteTransaction for InMemoryVoteTransaction {
    async fn find_vote(&mut self, vote_id: VoteId) -> AppResult<Option<Vote>> {
        Ok(self.staged.votes.get(&vote_id).cloned())
    }

    async fn next_vote_id(&mut self) -> AppResult<VoteId> {
        self.staged.last_id += 1;
        Ok(VoteId::new(self.staged.last_id))
    }

    async fn insert_vote(&mut self, vote: &Vote) -> AppResult<()> {
        if self.staged.votes.contains_key(&vote.id()) {
            return Err(AppError::Conflict(format!(
                "vote '{}' already exists",
                vote.id()
            )));
        }

        self.staged.votes.insert(vote.id(), vote.clone());
        Ok(())
    }

    async fn save_vote(&mut self, vote: &Vote) -> AppResult<()> {
        let Some(existing) = self.staged.votes.get_mut(&vote.id()) else {
            return Err(AppError::NotFound(format!(
                "vote '{}' does not exist",
                vote.id()
            )));
        };

        *existing = vote.clone();
        Ok(())
    }

    async fn upsert_position(
        &mut self,
        vote_id: VoteId,
        user_id: &str,
        position: Position,
    ) -> AppResult<()> {
        let records = self.staged.positions.entry(vote_id).or_default();
        match records.iter_mut().find(|record| record.user_id == user_id) {
            Some(record) => record.position = position,
            None => records.push(PositionRecord {
                user_id: user_id.to_owned(),
                position,
            }),
        }

        Ok(())
    }

    async fn list_positions(&mut self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>> {
        Ok(self.staged.positions_of(vote_id))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
