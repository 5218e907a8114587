//! Pure voting statistics over a room's participant list.
//!
//! Every function here is side-effect free and deterministic for a given
//! participant order. Tallies are kept in insertion order, so tie-breaks
//! resolve to the token that was counted first, which follows join order.

use indexmap::IndexMap;

use crate::{dto::validation::SPECIAL_TOKENS, state::room::Participant};

/// Sentinel token reported as the majority of an empty vote set.
pub const EMPTY_MAJORITY_TOKEN: &str = "-";

/// Outcome of a tie check over the current votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieOutcome {
    /// Whether more than one token shares the top count.
    pub tied: bool,
    /// The tokens sharing the top count, in first-counted order. Empty when
    /// no votes were cast.
    pub tokens: Vec<String>,
}

/// The most-cast token and how dominant it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MajorityOutcome {
    /// Winning token, or [`EMPTY_MAJORITY_TOKEN`] when nobody voted.
    pub token: String,
    /// Number of votes behind the winning token.
    pub count: usize,
    /// Total votes cast.
    pub total: usize,
}

/// Combined per-round statistics handed to read-only observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundAnalytics {
    /// Token counts in first-counted order.
    pub histogram: IndexMap<String, usize>,
    /// Tie verdict over the same tally.
    pub tie: TieOutcome,
    /// Dominant token, first-counted winning on equal counts.
    pub majority: MajorityOutcome,
    /// Share of voters who have cast a vote, as a percentage.
    pub participation_percent: f64,
    /// Score the round could be archived under without an override; empty
    /// when the votes leave nothing to suggest.
    pub suggested_score: String,
}

/// Token counts of all cast votes, keyed in the order tokens first appeared.
pub fn vote_histogram(participants: &[Participant]) -> IndexMap<String, usize> {
    let mut tally: IndexMap<String, usize> = IndexMap::new();
    for participant in participants {
        if let Some(vote) = participant.vote.as_ref() {
            *tally.entry(vote.clone()).or_insert(0) += 1;
        }
    }
    tally
}

/// Report whether the top vote count is shared by more than one token.
pub fn tie_check(participants: &[Participant]) -> TieOutcome {
    let tally = vote_histogram(participants);
    let Some(top) = tally.values().copied().max() else {
        return TieOutcome {
            tied: false,
            tokens: Vec::new(),
        };
    };

    let tokens: Vec<String> = tally
        .iter()
        .filter(|(_, count)| **count == top)
        .map(|(token, _)| token.clone())
        .collect();

    TieOutcome {
        tied: tokens.len() > 1,
        tokens,
    }
}

/// The single highest-count token. On equal counts the token counted first
/// wins; that tie-break is deliberate and stable for a given join order.
pub fn majority(participants: &[Participant]) -> MajorityOutcome {
    let tally = vote_histogram(participants);
    let total: usize = tally.values().sum();

    // Replace the leader only on a strictly greater count so the
    // first-counted token keeps winning ties.
    let mut winner: Option<(&str, usize)> = None;
    for (token, count) in &tally {
        if winner.is_none_or(|(_, best)| *count > best) {
            winner = Some((token.as_str(), *count));
        }
    }

    let Some((token, count)) = winner else {
        return MajorityOutcome {
            token: EMPTY_MAJORITY_TOKEN.to_owned(),
            count: 0,
            total: 0,
        };
    };

    MajorityOutcome {
        token: token.to_owned(),
        count,
        total,
    }
}

/// Percentage of voter-role participants who have cast a vote. Observers are
/// never counted. Zero when the room has no voters.
pub fn participation_ratio(participants: &[Participant]) -> f64 {
    let voters = participants.iter().filter(|p| p.is_voter()).count();
    if voters == 0 {
        return 0.0;
    }

    let voted = participants
        .iter()
        .filter(|p| p.is_voter() && p.vote.is_some())
        .count();

    voted as f64 / voters as f64 * 100.0
}

/// Suggest a final score for the round: the majority token, unless the votes
/// are tied, nobody voted, or the winner is a special token. An empty string
/// means there is nothing to suggest and a human has to decide.
pub fn suggest_final_score(participants: &[Participant]) -> String {
    if tie_check(participants).tied {
        return String::new();
    }

    let outcome = majority(participants);
    if outcome.total == 0 || SPECIAL_TOKENS.contains(&outcome.token.as_str()) {
        return String::new();
    }

    outcome.token
}

/// Compute the full statistics bundle for the current round.
pub fn round_analytics(participants: &[Participant]) -> RoundAnalytics {
    RoundAnalytics {
        histogram: vote_histogram(participants),
        tie: tie_check(participants),
        majority: majority(participants),
        participation_percent: participation_ratio(participants),
        suggested_score: suggest_final_score(participants),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::room::ParticipantRole;

    fn participant(name: &str, vote: Option<&str>, role: ParticipantRole) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            vote: vote.map(str::to_owned),
            color: "#81C784".to_owned(),
            role,
        }
    }

    fn voter(name: &str, vote: Option<&str>) -> Participant {
        participant(name, vote, ParticipantRole::Voter)
    }

    #[test]
    fn empty_vote_set_reports_sentinel_and_no_tie() {
        let participants = [voter("Alice", None), voter("Bob", None)];

        let outcome = majority(&participants);
        assert_eq!(outcome.token, EMPTY_MAJORITY_TOKEN);
        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.total, 0);

        let tie = tie_check(&participants);
        assert!(!tie.tied);
        assert!(tie.tokens.is_empty());
    }

    #[test]
    fn split_votes_tie_and_first_seen_majority() {
        // Alice votes "5", Bob votes "8": one vote each is a tie, and the
        // majority falls to the token counted first.
        let participants = [voter("Alice", Some("5")), voter("Bob", Some("8"))];

        let tie = tie_check(&participants);
        assert!(tie.tied);
        assert_eq!(tie.tokens, vec!["5".to_owned(), "8".to_owned()]);

        let outcome = majority(&participants);
        assert_eq!(outcome.token, "5");
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.total, 2);

        // Swapping the voting order swaps the winner.
        let reversed = [voter("Bob", Some("8")), voter("Alice", Some("5"))];
        assert_eq!(majority(&reversed).token, "8");
    }

    #[test]
    fn unanimous_votes_have_no_tie_and_full_participation() {
        let participants = [voter("Alice", Some("5")), voter("Bob", Some("5"))];

        let tie = tie_check(&participants);
        assert!(!tie.tied);
        assert_eq!(tie.tokens, vec!["5".to_owned()]);

        let outcome = majority(&participants);
        assert_eq!(outcome.token, "5");
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.total, 2);

        assert_eq!(participation_ratio(&participants), 100.0);
    }

    #[test]
    fn observers_do_not_count_toward_participation() {
        let participants = [
            voter("Alice", Some("3")),
            voter("Bob", None),
            participant("Carol", None, ParticipantRole::Observer),
        ];

        assert_eq!(participation_ratio(&participants), 50.0);
    }

    #[test]
    fn participation_is_zero_without_voters() {
        let participants = [participant("Carol", None, ParticipantRole::Observer)];
        assert_eq!(participation_ratio(&participants), 0.0);
    }

    #[test]
    fn histogram_counts_tokens_in_first_seen_order() {
        let participants = [
            voter("Alice", Some("8")),
            voter("Bob", Some("5")),
            voter("Carol", Some("8")),
            voter("Dan", None),
        ];

        let histogram = vote_histogram(&participants);
        let entries: Vec<(&str, usize)> = histogram
            .iter()
            .map(|(token, count)| (token.as_str(), *count))
            .collect();
        assert_eq!(entries, vec![("8", 2), ("5", 1)]);
    }

    #[test]
    fn suggestion_follows_a_clear_majority() {
        let participants = [
            voter("Alice", Some("13")),
            voter("Bob", Some("13")),
            voter("Carol", Some("8")),
        ];
        assert_eq!(suggest_final_score(&participants), "13");
    }

    #[test]
    fn no_suggestion_on_tie_special_winner_or_empty_votes() {
        let tied = [voter("Alice", Some("5")), voter("Bob", Some("8"))];
        assert_eq!(suggest_final_score(&tied), "");

        let unsure = [voter("Alice", Some("?")), voter("Bob", Some("?"))];
        assert_eq!(suggest_final_score(&unsure), "");

        let silent = [voter("Alice", None)];
        assert_eq!(suggest_final_score(&silent), "");
    }

    #[test]
    fn majority_above_a_tie_wins_outright() {
        let participants = [
            voter("Alice", Some("13")),
            voter("Bob", Some("13")),
            voter("Carol", Some("8")),
        ];

        let tie = tie_check(&participants);
        assert!(!tie.tied);

        let outcome = majority(&participants);
        assert_eq!(outcome.token, "13");
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.total, 3);
    }
}
