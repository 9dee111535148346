use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_core::AppResult;
use council_domain::{Position, Vote, VoteId};

/// One recorded position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    /// Voter.
    pub user_id: String,
    /// Recorded choice.
    pub position: Position,
}

/// Repository port for votes and positions.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Finds a vote by id.
    async fn find_vote(&self, vote_id: VoteId) -> AppResult<Option<Vote>>;

    /// Lists ongoing votes whose deadline is at or before `now`.
    async fn list_due_votes(&self, now: DateTime<Utc>) -> AppResult<Vec<VoteId>>;

    /// Lists the positions recorded on a vote.
    async fn list_positions(&self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>>;

    /// Opens a transaction over votes and positions.
    async fn begin(&self) -> AppResult<Box<dyn VoteTransaction>>;
}

/// Unit of work over votes and positions.
///
/// Dropping the transaction without calling [`VoteTransaction::commit`]
/// discards every staged change.
#[async_trait]
pub trait VoteTransaction: Send {
    /// Finds a vote by id, locking it for the rest of the transaction.
    async fn find_vote(&mut self, vote_id: VoteId) -> AppResult<Option<Vote>>;

    /// Reserves the id of the next vote.
    async fn next_vote_id(&mut self) -> AppResult<VoteId>;

    /// Inserts a new vote.
    async fn insert_vote(&mut self, vote: &Vote) -> AppResult<()>;

    /// Persists the mutable parts of a vote: state, detail and privacy.
    async fn save_vote(&mut self, vote: &Vote) -> AppResult<()>;

    /// Records a position, replacing any earlier one of the same user.
    async fn upsert_position(
        &mut self,
        vote_id: VoteId,
        user_id: &str,
        position: Position,
    ) -> AppResult<()>;

    /// Lists the positions recorded on a vote.
    async fn list_positions(&mut self, vote_id: VoteId) -> AppResult<Vec<PositionRecord>>;

    /// Makes every staged change visible.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
