use thiserror::Error;
use uuid::Uuid;

/// High-level phases a room can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// The room accepts participants and votes. `revealed` tells whether the
    /// current round's votes are face-up.
    Waiting {
        /// Whether votes are currently revealed to everyone in the room.
        revealed: bool,
    },
    /// The room has been closed by its owner; every mutation is rejected.
    Closed,
}

/// Events that can be applied to a room's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Someone joins the room as a voter or observer.
    ParticipantJoined {
        /// Identifier assigned to the newcomer.
        participant_id: Uuid,
    },
    /// A voter casts, changes, or clears their vote.
    VoteCast {
        /// The voter whose ballot changes.
        participant_id: Uuid,
    },
    /// The owner turns all votes face-up.
    VotesRevealed,
    /// The owner turns votes back face-down without archiving.
    VotesHidden,
    /// The owner archives the current round and opens the next one.
    RoundStarted,
    /// The owner removes a participant from the room.
    ParticipantRemoved {
        /// The participant being removed.
        participant_id: Uuid,
    },
    /// The owner closes the room for good.
    RoomClosed,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Compute the phase an event leads to, or reject it.
///
/// Every room mutation is funneled through this table before any state is
/// touched, so a closed room can never be modified and reveal/hide cannot be
/// applied twice in a row.
pub fn compute_transition(from: RoomPhase, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
    let next = match (from, &event) {
        (RoomPhase::Waiting { revealed }, RoomEvent::ParticipantJoined { .. }) => {
            RoomPhase::Waiting { revealed }
        }
        // Ballots only move while face-down.
        (RoomPhase::Waiting { revealed: false }, RoomEvent::VoteCast { .. }) => {
            RoomPhase::Waiting { revealed: false }
        }
        (RoomPhase::Waiting { revealed: false }, RoomEvent::VotesRevealed) => {
            RoomPhase::Waiting { revealed: true }
        }
        (RoomPhase::Waiting { revealed: true }, RoomEvent::VotesHidden) => {
            RoomPhase::Waiting { revealed: false }
        }
        // A round may advance with votes still face-down; archiving is gated
        // on the revealed flag by the caller, not by the table.
        (RoomPhase::Waiting { .. }, RoomEvent::RoundStarted) => {
            RoomPhase::Waiting { revealed: false }
        }
        (RoomPhase::Waiting { revealed }, RoomEvent::ParticipantRemoved { .. }) => {
            RoomPhase::Waiting { revealed }
        }
        (RoomPhase::Waiting { .. }, RoomEvent::RoomClosed) => RoomPhase::Closed,
        (from, _) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIDDEN: RoomPhase = RoomPhase::Waiting { revealed: false };
    const REVEALED: RoomPhase = RoomPhase::Waiting { revealed: true };

    #[test]
    fn full_happy_path_through_a_round() {
        let phase = compute_transition(
            HIDDEN,
            RoomEvent::ParticipantJoined {
                participant_id: Uuid::new_v4(),
            },
        )
        .unwrap();
        assert_eq!(phase, HIDDEN);

        let phase = compute_transition(
            phase,
            RoomEvent::VoteCast {
                participant_id: Uuid::new_v4(),
            },
        )
        .unwrap();
        assert_eq!(phase, HIDDEN);

        let phase = compute_transition(phase, RoomEvent::VotesRevealed).unwrap();
        assert_eq!(phase, REVEALED);

        let phase = compute_transition(phase, RoomEvent::RoundStarted).unwrap();
        assert_eq!(phase, HIDDEN);

        let phase = compute_transition(phase, RoomEvent::RoomClosed).unwrap();
        assert_eq!(phase, RoomPhase::Closed);
    }

    #[test]
    fn reveal_requires_hidden_votes() {
        let err = compute_transition(REVEALED, RoomEvent::VotesRevealed).unwrap_err();
        assert_eq!(err.from, REVEALED);
        assert_eq!(err.event, RoomEvent::VotesRevealed);
    }

    #[test]
    fn hide_requires_revealed_votes() {
        let err = compute_transition(HIDDEN, RoomEvent::VotesHidden).unwrap_err();
        assert_eq!(err.from, HIDDEN);
    }

    #[test]
    fn new_round_hides_votes_from_either_state() {
        assert_eq!(
            compute_transition(HIDDEN, RoomEvent::RoundStarted).unwrap(),
            HIDDEN
        );
        assert_eq!(
            compute_transition(REVEALED, RoomEvent::RoundStarted).unwrap(),
            HIDDEN
        );
    }

    #[test]
    fn votes_are_frozen_while_revealed() {
        let event = RoomEvent::VoteCast {
            participant_id: Uuid::new_v4(),
        };
        let err = compute_transition(REVEALED, event.clone()).unwrap_err();
        assert_eq!(err.from, REVEALED);
        assert_eq!(err.event, event);
    }

    #[test]
    fn closed_room_rejects_every_event() {
        let events = [
            RoomEvent::ParticipantJoined {
                participant_id: Uuid::new_v4(),
            },
            RoomEvent::VoteCast {
                participant_id: Uuid::new_v4(),
            },
            RoomEvent::VotesRevealed,
            RoomEvent::VotesHidden,
            RoomEvent::RoundStarted,
            RoomEvent::ParticipantRemoved {
                participant_id: Uuid::new_v4(),
            },
            RoomEvent::RoomClosed,
        ];

        for event in events {
            let err = compute_transition(RoomPhase::Closed, event.clone()).unwrap_err();
            assert_eq!(err.from, RoomPhase::Closed);
            assert_eq!(err.event, event);
        }
    }
}
