//! Participant-side membership changes.
//!
//! The event side of every transition is a whole new [`Event`](crate::Event)
//! record. The participant side is expressed as a delta instead, so it can be
//! replayed against whatever the participant record looks like at write time.
//!
//! Every change moves the participant's membership in one event to a target
//! state (enrolled, waiting, or not involved) regardless of where it starts.
//! Re-applying a change is a no-op, and applying it to a record left behind
//! by an interrupted write brings that record back in line.

use crate::types::{Event, EventId, Participant, ParticipantId};
use serde::{Deserialize, Serialize};

/// How a participant's membership in one event changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipChange {
    /// Added to the roster
    Enroll,
    /// Removed from the roster
    Unenroll,
    /// Added to the waitlist, never on the roster at the same time
    Waitlist,
    /// Removed from the waitlist
    Unwaitlist,
    /// Moved from the waitlist to the roster
    Promote,
    /// Event deleted: drop every trace of it
    Forget,
}

impl MembershipChange {
    /// Whether the change only removes memberships
    #[must_use]
    pub const fn is_removal(self) -> bool {
        matches!(self, Self::Unenroll | Self::Unwaitlist | Self::Forget)
    }
}

/// A membership change for one participant in one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipDelta {
    /// Participant whose record changes
    pub participant: ParticipantId,
    /// Event the membership refers to
    pub event: EventId,
    /// What happens to the membership
    pub change: MembershipChange,
}

impl MembershipDelta {
    /// Creates a new delta
    #[must_use]
    pub const fn new(participant: ParticipantId, event: EventId, change: MembershipChange) -> Self {
        Self {
            participant,
            event,
            change,
        }
    }

    /// Delta that mirrors what `event` records for `participant`.
    #[must_use]
    pub fn syncing(participant: ParticipantId, event: &Event) -> Self {
        let change = if event.is_signed_up(&participant) {
            MembershipChange::Enroll
        } else if event.is_waitlisted(&participant) {
            MembershipChange::Waitlist
        } else {
            MembershipChange::Forget
        };
        Self::new(participant, event.id, change)
    }

    /// Whether `participant` already reflects this delta.
    #[must_use]
    pub fn is_reflected_in(&self, participant: &Participant) -> bool {
        !self.apply(&mut participant.clone())
    }

    /// Applies the delta to `participant`, returning whether anything changed.
    ///
    /// Re-applying a delta that is already reflected is a no-op.
    pub fn apply(&self, participant: &mut Participant) -> bool {
        let enrolled = &mut participant.enrolled_events;
        let waitlisted = &mut participant.waitlisted_events;
        match self.change {
            MembershipChange::Enroll | MembershipChange::Promote => {
                let left = waitlisted.remove(&self.event);
                enrolled.insert(self.event) | left
            },
            MembershipChange::Waitlist => {
                let left = enrolled.remove(&self.event);
                waitlisted.insert(self.event) | left
            },
            MembershipChange::Unenroll | MembershipChange::Unwaitlist | MembershipChange::Forget => {
                let left = waitlisted.remove(&self.event);
                enrolled.remove(&self.event) | left
            },
        }
    }
}
