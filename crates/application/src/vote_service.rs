//! Vote lifecycle: creation, positions, veto, privacy and scheduled conclusion.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use council_core::{AppError, AppResult, Identity};
use council_domain::{
    Permission, Position, Vote, VoteConclusion, VoteDraft, VoteId, VoteState, VoteStateDetail,
    VoteTally, VoterLists,
};
use tracing::{info, warn};

use crate::governance_events::publish_all;
use crate::{
    AuthorizationService, EventPublisher, GovernanceEvent, PositionRecord, SweepJob,
    SweepReport, TallyView, VoteRepository,
};

/// Tunables of vote conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSettings {
    /// Lower bound of a tie-break successor's duration.
    pub successor_min_duration: Duration,
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            successor_min_duration: Duration::seconds(60),
        }
    }
}

/// Application service for the vote lifecycle.
#[derive(Clone)]
pub struct VoteService {
    repository: Arc<dyn VoteRepository>,
    authorization_service: AuthorizationService,
    event_publisher: Arc<dyn EventPublisher>,
    settings: VoteSettings,
}

impl VoteService {
    /// Creates a new vote service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn VoteRepository>,
        authorization_service: AuthorizationService,
        event_publisher: Arc<dyn EventPublisher>,
        settings: VoteSettings,
    ) -> Self {
        Self {
            repository,
            authorization_service,
            event_publisher,
            settings,
        }
    }

    /// Opens a vote.
    pub async fn create_vote(&self, actor: &Identity, draft: VoteDraft) -> AppResult<Vote> {
        self.create_vote_at(actor, draft, Utc::now()).await
    }

    /// Opens a vote as of `now`.
    pub async fn create_vote_at(
        &self,
        actor: &Identity,
        draft: VoteDraft,
        now: DateTime<Utc>,
    ) -> AppResult<Vote> {
        self.authorization_service
            .require_permission(actor.subject(), Permission::StartVote)
            .await?;

        let mut transaction = self.repository.begin().await?;
        let vote_id = transaction.next_vote_id().await?;
        let vote = Vote::open(vote_id, draft, now)?;
        transaction.insert_vote(&vote).await?;
        transaction.commit().await?;

        info!(vote_id = %vote.id(), subject = %actor.subject(), "vote created");
        self.publish([GovernanceEvent::VoteCreated { vote_id: vote.id() }])
            .await;

        Ok(vote)
    }

    /// Records the actor's position, replacing any earlier one.
    pub async fn cast_position(
        &self,
        actor: &Identity,
        vote_id: VoteId,
        position: Position,
    ) -> AppResult<TallyView> {
        self.authorization_service
            .require_permission(actor.subject(), Permission::Vote)
            .await?;

        let mut transaction = self.repository.begin().await?;
        let vote = find_locked(transaction.find_vote(vote_id).await?, vote_id)?;
        vote.accept_position(position)?;
        transaction
            .upsert_position(vote_id, actor.subject(), position)
            .await?;
        let positions = transaction.list_positions(vote_id).await?;
        transaction.commit().await?;

        let tally = tally_view(&vote, positions);
        self.publish([GovernanceEvent::VoteTallyUpdated {
            vote_id,
            tally: tally.clone(),
        }])
        .await;

        Ok(tally)
    }

    /// Vetoes an ongoing vote.
    pub async fn veto(&self, actor: &Identity, vote_id: VoteId, reason: String) -> AppResult<Vote> {
        self.authorization_service
            .require_permission(actor.subject(), Permission::Veto)
            .await?;

        let detail = VoteStateDetail::Veto {
            vetoed_by: actor.subject().to_owned(),
            reason,
        };

        let mut transaction = self.repository.begin().await?;
        let mut vote = find_locked(transaction.find_vote(vote_id).await?, vote_id)?;
        vote.transition(VoteState::FailedVeto, detail.clone())?;
        transaction.save_vote(&vote).await?;
        transaction.commit().await?;

        info!(vote_id = %vote_id, subject = %actor.subject(), "vote vetoed");
        self.publish([GovernanceEvent::VoteStateChanged {
            vote_id,
            new_state: VoteState::FailedVeto,
            detail,
        }])
        .await;

        Ok(vote)
    }

    /// Restricts an ongoing simple vote to anonymous tallies.
    pub async fn set_private(&self, actor: &Identity, vote_id: VoteId) -> AppResult<Vote> {
        self.authorization_service
            .require_permission(actor.subject(), Permission::StartVote)
            .await?;

        let mut transaction = self.repository.begin().await?;
        let mut vote = find_locked(transaction.find_vote(vote_id).await?, vote_id)?;
        vote.make_private()?;
        transaction.save_vote(&vote).await?;
        transaction.commit().await?;

        info!(vote_id = %vote_id, subject = %actor.subject(), "vote made private");
        Ok(vote)
    }

    /// Returns one vote.
    pub async fn find_vote(&self, actor: &Identity, vote_id: VoteId) -> AppResult<Vote> {
        self.authorization_service.require_info_access(actor).await?;
        self.repository
            .find_vote(vote_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("vote '{vote_id}' does not exist")))
    }

    /// Returns the tally view of a vote, anonymous when the vote is private.
    pub async fn tally(&self, actor: &Identity, vote_id: VoteId) -> AppResult<TallyView> {
        let vote = self.find_vote(actor, vote_id).await?;
        let positions = self.repository.list_positions(vote_id).await?;
        Ok(tally_view(&vote, positions))
    }

    /// Concludes every ongoing vote whose deadline passed at `now`.
    ///
    /// Each vote is concluded in its own transaction; a failure is logged and
    /// the pass continues.
    pub async fn conclude_due_votes(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self.repository.list_due_votes(now).await?;
        let mut report = SweepReport::default();

        for vote_id in due {
            match self.conclude_vote(vote_id, now).await {
                Ok(events) => {
                    report.processed += 1;
                    self.publish(events).await;
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(vote_id = %vote_id, error = %error, "failed to conclude vote");
                }
            }
        }

        Ok(report)
    }

    async fn conclude_vote(
        &self,
        vote_id: VoteId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GovernanceEvent>> {
        let mut transaction = self.repository.begin().await?;
        let Some(mut vote) = transaction.find_vote(vote_id).await? else {
            return Ok(Vec::new());
        };
        if !vote.is_due(now) {
            return Ok(Vec::new());
        }

        let positions = transaction.list_positions(vote_id).await?;
        let tally = VoteTally::from_positions(positions.iter().map(|record| &record.position));

        let mut events = Vec::new();
        let (state, detail) = match vote.conclude(&tally) {
            VoteConclusion::TieBreak => {
                let successor_id = transaction.next_vote_id().await?;
                let successor = Vote::open(
                    successor_id,
                    vote.successor_draft(self.settings.successor_min_duration),
                    now,
                )?;
                transaction.insert_vote(&successor).await?;
                events.push(GovernanceEvent::VoteCreated {
                    vote_id: successor_id,
                });

                (
                    VoteState::FailedInconclusive,
                    VoteStateDetail::Inconclusive {
                        successor_vote_id: successor_id,
                    },
                )
            }
            VoteConclusion::Decided(state) => (
                state,
                VoteStateDetail::Decision {
                    succeeded: state != VoteState::FailedVotes,
                },
            ),
        };

        vote.transition(state, detail.clone())?;
        transaction.save_vote(&vote).await?;
        transaction.commit().await?;

        info!(
            vote_id = %vote_id,
            state = state.as_str(),
            for_count = tally.for_count,
            against_count = tally.against_count,
            abstain_count = tally.abstain_count,
            "vote concluded"
        );
        events.push(GovernanceEvent::VoteStateChanged {
            vote_id,
            new_state: state,
            detail,
        });

        Ok(events)
    }

    async fn publish(&self, events: impl IntoIterator<Item = GovernanceEvent>) {
        publish_all(self.event_publisher.as_ref(), events).await;
    }
}

#[async_trait]
impl SweepJob for VoteService {
    fn name(&self) -> &'static str {
        "vote_conclusion"
    }

    async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        self.conclude_due_votes(now).await
    }
}

fn find_locked(vote: Option<Vote>, vote_id: VoteId) -> AppResult<Vote> {
    vote.ok_or_else(|| AppError::NotFound(format!("vote '{vote_id}' does not exist")))
}

fn tally_view(vote: &Vote, positions: Vec<PositionRecord>) -> TallyView {
    if vote.is_private() {
        return TallyView::Anonymous {
            counts: VoteTally::from_positions(positions.iter().map(|record| &record.position)),
        };
    }

    TallyView::Public {
        voters: VoterLists::from_positions(
            positions
                .into_iter()
                .map(|record| (record.user_id, record.position)),
        ),
    }
}
