//! Vote lifecycle entities and per-kind decision rules.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use council_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Identifier of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(i64);

impl VoteId {
    /// Wraps a stored vote id.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VoteId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Kind of vote, selecting the decision function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    /// Plain majority with quorum and parity guard.
    Simple,
    /// Two-thirds majority with quorum and parity guard.
    Qualified,
    /// Plain majority without quorum.
    Emergency,
}

impl VoteKind {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Qualified => "qualified",
            Self::Emergency => "emergency",
        }
    }

    /// Decides whether a tally passes under this kind.
    ///
    /// Simple and qualified votes only bind with an odd number of
    /// participants above three.
    #[must_use]
    pub fn passes(&self, tally: &VoteTally) -> bool {
        let total = tally.total();
        let quorate = total % 2 == 1 && total > 3;
        let majority = tally.for_count > tally.against_count;

        match self {
            Self::Simple => majority && quorate,
            Self::Qualified => tally.for_count > (total / 3) * 2 && majority && quorate,
            Self::Emergency => majority,
        }
    }

    /// Returns the terminal state reached when a vote of this kind passes.
    #[must_use]
    pub fn success_state(&self) -> VoteState {
        match self {
            Self::Emergency => VoteState::SucceededEmergency,
            Self::Simple | Self::Qualified => VoteState::Succeeded,
        }
    }
}

impl FromStr for VoteKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "simple" => Ok(Self::Simple),
            "qualified" => Ok(Self::Qualified),
            "emergency" => Ok(Self::Emergency),
            _ => Err(AppError::Validation(format!(
                "unknown vote kind '{value}'"
            ))),
        }
    }
}

/// Vote lifecycle state. Every state except `Ongoing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    /// Accepting positions.
    Ongoing,
    /// Vetoed before conclusion.
    FailedVeto,
    /// Tied with abstentions enabled; a successor vote was opened.
    FailedInconclusive,
    /// Did not meet the decision rule.
    FailedVotes,
    /// Passed.
    Succeeded,
    /// Passed as an emergency vote.
    SucceededEmergency,
}

impl VoteState {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::FailedVeto => "failed_veto",
            Self::FailedInconclusive => "failed_inconclusive",
            Self::FailedVotes => "failed_votes",
            Self::Succeeded => "succeeded",
            Self::SucceededEmergency => "succeeded_emergency",
        }
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

impl FromStr for VoteState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ongoing" => Ok(Self::Ongoing),
            "failed_veto" => Ok(Self::FailedVeto),
            "failed_inconclusive" => Ok(Self::FailedInconclusive),
            "failed_votes" => Ok(Self::FailedVotes),
            "succeeded" => Ok(Self::Succeeded),
            "succeeded_emergency" => Ok(Self::SucceededEmergency),
            _ => Err(AppError::Validation(format!(
                "unknown vote state '{value}'"
            ))),
        }
    }
}

/// Choice a user records on a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// In favour.
    For,
    /// Opposed.
    Against,
    /// Abstaining.
    Abstain,
}

impl Position {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Against => "against",
            Self::Abstain => "abstain",
        }
    }
}

impl FromStr for Position {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "for" => Ok(Self::For),
            "against" => Ok(Self::Against),
            "abstain" => Ok(Self::Abstain),
            _ => Err(AppError::Validation(format!("unknown position '{value}'"))),
        }
    }
}

/// Anonymous counts of recorded positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Positions in favour.
    #[serde(rename = "for")]
    pub for_count: u64,
    /// Positions against.
    #[serde(rename = "against")]
    pub against_count: u64,
    /// Abstentions.
    #[serde(rename = "abstain")]
    pub abstain_count: u64,
}

impl VoteTally {
    /// Counts a sequence of positions.
    #[must_use]
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Self {
        positions
            .into_iter()
            .fold(Self::default(), |mut tally, position| {
                match position {
                    Position::For => tally.for_count += 1,
                    Position::Against => tally.against_count += 1,
                    Position::Abstain => tally.abstain_count += 1,
                }
                tally
            })
    }

    /// Returns the number of participants.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.for_count + self.against_count + self.abstain_count
    }
}

/// Public tally: voter ids grouped by choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterLists {
    /// Users in favour.
    #[serde(rename = "for")]
    pub for_voters: Vec<String>,
    /// Users against.
    #[serde(rename = "against")]
    pub against_voters: Vec<String>,
    /// Users abstaining.
    #[serde(rename = "abstain")]
    pub abstain_voters: Vec<String>,
}

impl VoterLists {
    /// Groups `(user_id, position)` pairs by choice.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = (String, Position)>) -> Self {
        let mut lists = Self::default();
        for (user_id, position) in positions {
            match position {
                Position::For => lists.for_voters.push(user_id),
                Position::Against => lists.against_voters.push(user_id),
                Position::Abstain => lists.abstain_voters.push(user_id),
            }
        }
        lists
    }
}

/// Transition-specific detail recorded with a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteStateDetail {
    /// The vote was vetoed.
    Veto {
        /// User who vetoed.
        vetoed_by: String,
        /// Stated reason.
        reason: String,
    },
    /// The vote tied and a successor was opened.
    Inconclusive {
        /// Id of the successor vote.
        successor_vote_id: VoteId,
    },
    /// The decision function ran.
    Decision {
        /// Whether the vote passed.
        succeeded: bool,
    },
}

/// Outcome of concluding a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteConclusion {
    /// Tie with abstentions enabled; a successor vote must be opened.
    TieBreak,
    /// The decision function selected this terminal state.
    Decided(VoteState),
}

/// Caller-supplied parameters of a new vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteDraft {
    /// Vote title.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Decision kind.
    pub kind: VoteKind,
    /// Time until the deadline.
    pub duration: Duration,
    /// Whether only anonymous counts are published.
    pub is_private: bool,
    /// Whether abstentions are accepted.
    pub has_abstain: bool,
}

/// Vote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    id: VoteId,
    name: NonEmptyString,
    description: String,
    kind: VoteKind,
    has_abstain: bool,
    is_private: bool,
    state: VoteState,
    deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    detail: Option<VoteStateDetail>,
}

impl Vote {
    /// Opens a new vote at `now`.
    pub fn open(id: VoteId, draft: VoteDraft, now: DateTime<Utc>) -> AppResult<Self> {
        if draft.duration <= Duration::zero() {
            return Err(AppError::Validation(
                "vote duration must be greater than zero".to_owned(),
            ));
        }

        if draft.is_private && draft.kind != VoteKind::Simple {
            return Err(AppError::Validation(format!(
                "only simple votes can be private, got '{}'",
                draft.kind.as_str()
            )));
        }

        let deadline = now.checked_add_signed(draft.duration).ok_or_else(|| {
            AppError::Validation("vote duration is out of range".to_owned())
        })?;

        Ok(Self {
            id,
            name: NonEmptyString::new(draft.name)?,
            description: draft.description,
            kind: draft.kind,
            has_abstain: draft.has_abstain,
            is_private: draft.is_private,
            state: VoteState::Ongoing,
            deadline,
            created_at: now,
            detail: None,
        })
    }

    /// Rehydrates a vote from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        id: VoteId,
        name: NonEmptyString,
        description: String,
        kind: VoteKind,
        has_abstain: bool,
        is_private: bool,
        state: VoteState,
        deadline: DateTime<Utc>,
        created_at: DateTime<Utc>,
        detail: Option<VoteStateDetail>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind,
            has_abstain,
            is_private,
            state,
            deadline,
            created_at,
            detail,
        }
    }

    /// Returns vote id.
    #[must_use]
    pub fn id(&self) -> VoteId {
        self.id
    }

    /// Returns vote name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns vote description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns vote kind.
    #[must_use]
    pub fn kind(&self) -> VoteKind {
        self.kind
    }

    /// Returns whether abstentions are accepted.
    #[must_use]
    pub fn has_abstain(&self) -> bool {
        self.has_abstain
    }

    /// Returns whether only anonymous counts are published.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.is_private
    }

    /// Returns current state.
    #[must_use]
    pub fn state(&self) -> VoteState {
        self.state
    }

    /// Returns the deadline.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Returns the creation instant.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns detail of the terminal transition, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&VoteStateDetail> {
        self.detail.as_ref()
    }

    /// Returns whether the vote is ongoing and past its deadline.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == VoteState::Ongoing && self.deadline <= now
    }

    /// Fails with a conflict unless the vote is ongoing.
    pub fn ensure_ongoing(&self) -> AppResult<()> {
        if self.state.is_terminal() {
            return Err(AppError::Conflict(format!(
                "vote '{}' is not ongoing (state '{}')",
                self.id,
                self.state.as_str()
            )));
        }

        Ok(())
    }

    /// Checks that `position` may be cast on this vote.
    pub fn accept_position(&self, position: Position) -> AppResult<()> {
        self.ensure_ongoing()?;

        if position == Position::Abstain && !self.has_abstain {
            return Err(AppError::Validation(format!(
                "vote '{}' does not accept abstentions",
                self.id
            )));
        }

        Ok(())
    }

    /// Marks the vote private.
    pub fn make_private(&mut self) -> AppResult<()> {
        self.ensure_ongoing()?;

        if self.kind != VoteKind::Simple {
            return Err(AppError::Validation(format!(
                "only simple votes can be made private, vote '{}' is '{}'",
                self.id,
                self.kind.as_str()
            )));
        }

        if self.is_private {
            return Err(AppError::Conflict(format!(
                "vote '{}' is already private",
                self.id
            )));
        }

        self.is_private = true;
        Ok(())
    }

    /// Moves the vote into a terminal state with its detail.
    pub fn transition(&mut self, state: VoteState, detail: VoteStateDetail) -> AppResult<()> {
        self.ensure_ongoing()?;

        if !state.is_terminal() {
            return Err(AppError::Validation(
                "a vote can only transition into a terminal state".to_owned(),
            ));
        }

        self.state = state;
        self.detail = Some(detail);
        Ok(())
    }

    /// Applies the tie-break rule and the decision function to a tally.
    #[must_use]
    pub fn conclude(&self, tally: &VoteTally) -> VoteConclusion {
        if self.has_abstain && tally.for_count == tally.against_count {
            return VoteConclusion::TieBreak;
        }

        if self.kind.passes(tally) {
            VoteConclusion::Decided(self.kind.success_state())
        } else {
            VoteConclusion::Decided(VoteState::FailedVotes)
        }
    }

    /// Builds the draft of the tie-break successor.
    ///
    /// The successor keeps the original duration budget, never less than
    /// `min_duration`, and does not accept abstentions.
    #[must_use]
    pub fn successor_draft(&self, min_duration: Duration) -> VoteDraft {
        let budget = self.deadline - self.created_at;

        VoteDraft {
            name: self.name.as_str().to_owned(),
            description: self.description.clone(),
            kind: self.kind,
            duration: budget.max(min_duration),
            is_private: self.is_private,
            has_abstain: false,
        }
    }
}

#[cfg(test)]
mod tests;
