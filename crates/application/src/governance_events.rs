use async_trait::async_trait;
use council_core::AppResult;
use council_domain::{
    RoleChangeReason, RoleId, RoleUpdateType, VoteId, VoteState, VoteStateDetail, VoteTally,
    VoterLists,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tally view published for a vote.
///
/// Private votes only expose anonymous counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum TallyView {
    /// Counts per choice.
    Anonymous {
        /// Aggregated counts.
        counts: VoteTally,
    },
    /// Voter ids per choice.
    Public {
        /// Voters grouped by choice.
        voters: VoterLists,
    },
}

/// Change of one role binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// Affected role.
    pub role_id: RoleId,
    /// Affected holder.
    pub user_id: String,
    /// Whether the binding was added or removed.
    pub update_type: RoleUpdateType,
    /// Why the binding changed.
    pub reason: RoleChangeReason,
    /// Whether the change was caused by revoking an issuing grant.
    pub is_cascading: bool,
    /// User who removed the binding explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_by: Option<String>,
}

/// State change handed to the event fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GovernanceEvent {
    /// A vote was opened.
    VoteCreated {
        /// New vote id.
        vote_id: VoteId,
    },
    /// A vote reached a terminal state.
    VoteStateChanged {
        /// Concluded vote id.
        vote_id: VoteId,
        /// Terminal state.
        new_state: VoteState,
        /// Transition detail.
        detail: VoteStateDetail,
    },
    /// A position was recorded.
    VoteTallyUpdated {
        /// Vote id.
        vote_id: VoteId,
        /// Current tally.
        tally: TallyView,
    },
    /// A role binding changed.
    RoleUpdated(RoleUpdate),
}

/// Outbound port for governance events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hands one event to the fan-out.
    async fn publish(&self, event: GovernanceEvent) -> AppResult<()>;
}

/// Publishes events in order. Delivery failures are logged and never
/// undo the committed change that produced them.
pub(crate) async fn publish_all(
    publisher: &dyn EventPublisher,
    events: impl IntoIterator<Item = GovernanceEvent>,
) {
    for event in events {
        if let Err(error) = publisher.publish(event).await {
            warn!(error = %error, "failed to publish governance event");
        }
    }
}
