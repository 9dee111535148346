use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use super::{
    Position, Vote, VoteConclusion, VoteDraft, VoteId, VoteKind, VoteState, VoteStateDetail,
    VoteTally, VoterLists,
};

fn tally(for_count: u64, against_count: u64, abstain_count: u64) -> VoteTally {
    VoteTally {
        for_count,
        against_count,
        abstain_count,
    }
}

fn draft(kind: VoteKind, has_abstain: bool) -> VoteDraft {
    VoteDraft {
        name: "Budget 2027".to_owned(),
        description: "Approve the yearly budget".to_owned(),
        kind,
        duration: Duration::hours(1),
        is_private: false,
        has_abstain,
    }
}

fn open(kind: VoteKind, has_abstain: bool) -> Vote {
    let Some(now) = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single() else {
        panic!("valid timestamp");
    };
    Vote::open(VoteId::new(7), draft(kind, has_abstain), now).unwrap_or_else(|_| unreachable!())
}

#[test]
fn simple_vote_needs_more_than_three_participants() {
    assert!(!VoteKind::Simple.passes(&tally(2, 1, 0)));
    assert!(VoteKind::Simple.passes(&tally(3, 2, 0)));
}

#[test]
fn simple_vote_needs_odd_total() {
    assert!(!VoteKind::Simple.passes(&tally(3, 1, 0)));
}

#[test]
fn qualified_vote_needs_two_thirds() {
    assert!(VoteKind::Qualified.passes(&tally(7, 2, 0)));
    assert!(!VoteKind::Qualified.passes(&tally(6, 3, 0)));
}

#[test]
fn emergency_vote_ignores_quorum() {
    assert!(VoteKind::Emergency.passes(&tally(1, 0, 0)));
    assert!(!VoteKind::Emergency.passes(&tally(1, 1, 5)));
    assert_eq!(
        VoteKind::Emergency.success_state(),
        VoteState::SucceededEmergency
    );
}

#[test]
fn tie_with_abstain_requests_tie_break() {
    let vote = open(VoteKind::Simple, true);
    assert_eq!(vote.conclude(&tally(2, 2, 1)), VoteConclusion::TieBreak);
}

#[test]
fn tie_without_abstain_fails() {
    let vote = open(VoteKind::Simple, false);
    assert_eq!(
        vote.conclude(&tally(2, 2, 0)),
        VoteConclusion::Decided(VoteState::FailedVotes)
    );
}

#[test]
fn abstain_is_rejected_without_rights() {
    let vote = open(VoteKind::Simple, false);
    assert!(vote.accept_position(Position::Abstain).is_err());
    assert!(vote.accept_position(Position::For).is_ok());
}

#[test]
fn terminal_vote_rejects_positions_and_transitions() {
    let mut vote = open(VoteKind::Simple, true);
    let vetoed = vote.transition(
        VoteState::FailedVeto,
        VoteStateDetail::Veto {
            vetoed_by: "watchdog".to_owned(),
            reason: "procedure".to_owned(),
        },
    );
    assert!(vetoed.is_ok());

    assert!(vote.accept_position(Position::For).is_err());
    assert!(
        vote.transition(
            VoteState::Succeeded,
            VoteStateDetail::Decision { succeeded: true }
        )
        .is_err()
    );
    assert_eq!(vote.state(), VoteState::FailedVeto);
}

#[test]
fn only_ongoing_simple_votes_become_private_once() {
    let mut qualified = open(VoteKind::Qualified, false);
    assert!(qualified.make_private().is_err());

    let mut simple = open(VoteKind::Simple, false);
    assert!(simple.make_private().is_ok());
    assert!(simple.is_private());
    assert!(simple.make_private().is_err());
}

#[test]
fn private_creation_is_limited_to_simple_votes() {
    let now = Utc::now();
    let mut private_emergency = draft(VoteKind::Emergency, false);
    private_emergency.is_private = true;
    assert!(Vote::open(VoteId::new(1), private_emergency, now).is_err());

    let mut zero = draft(VoteKind::Simple, false);
    zero.duration = Duration::zero();
    assert!(Vote::open(VoteId::new(2), zero, now).is_err());
}

#[test]
fn successor_keeps_budget_and_drops_abstain() {
    let vote = open(VoteKind::Qualified, true);
    let successor = vote.successor_draft(Duration::seconds(60));

    assert_eq!(successor.name, "Budget 2027");
    assert_eq!(successor.kind, VoteKind::Qualified);
    assert_eq!(successor.duration, Duration::hours(1));
    assert!(!successor.has_abstain);
}

#[test]
fn successor_duration_is_clamped() {
    let vote = open(VoteKind::Simple, true);
    let successor = vote.successor_draft(Duration::hours(2));
    assert_eq!(successor.duration, Duration::hours(2));
}

#[test]
fn voter_lists_group_by_choice() {
    let lists = VoterLists::from_positions([
        ("a".to_owned(), Position::For),
        ("b".to_owned(), Position::Against),
        ("c".to_owned(), Position::For),
    ]);
    assert_eq!(lists.for_voters, vec!["a".to_owned(), "c".to_owned()]);
    assert_eq!(lists.against_voters, vec!["b".to_owned()]);
    assert!(lists.abstain_voters.is_empty());
}

proptest! {
    #[test]
    fn even_totals_never_pass_quorate_kinds(
        for_count in 0_u64..50,
        against_count in 0_u64..50,
        abstain_count in 0_u64..50,
    ) {
        let counts = tally(for_count, against_count, abstain_count);
        prop_assume!(counts.total() % 2 == 0);
        prop_assert!(!VoteKind::Simple.passes(&counts));
        prop_assert!(!VoteKind::Qualified.passes(&counts));
    }

    #[test]
    fn qualified_pass_implies_simple_pass(
        for_count in 0_u64..50,
        against_count in 0_u64..50,
        abstain_count in 0_u64..50,
    ) {
        let counts = tally(for_count, against_count, abstain_count);
        if VoteKind::Qualified.passes(&counts) {
            prop_assert!(VoteKind::Simple.passes(&counts));
        }
    }

    #[test]
    fn tally_counts_every_position(choices in proptest::collection::vec(0_u8..3, 0..40)) {
        let positions: Vec<Position> = choices
            .iter()
            .map(|choice| match choice {
                0 => Position::For,
                1 => Position::Against,
                _ => Position::Abstain,
            })
            .collect();
        let counts = VoteTally::from_positions(&positions);
        prop_assert_eq!(counts.total(), positions.len() as u64);
    }
}
