//! Priority-ordered waitlist.
//!
//! VIP entries form a block ahead of every non-VIP entry. Inside each block
//! the order is first-come-first-served. Inserting never reorders existing
//! entries; it only chooses where the newcomer goes.
//!
//! ```text
//! [A, B]          insert C (VIP)  → [C, A, B]
//! [C, A, B]       insert D (VIP)  → [C, D, A, B]
//! [C, D, A, B]    insert E        → [C, D, A, B, E]
//! [C, D, A, B, E] promote_front   → C, leaving [D, A, B, E]
//! ```

use crate::error::EnrollmentError;
use crate::types::{EventId, ParticipantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A waiting participant together with the priority it was queued at.
///
/// VIP status is immutable per account, so caching it here keeps ordering
/// decisions free of participant lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Waiting participant
    pub participant: ParticipantId,
    /// Whether the participant was queued in the VIP block
    pub vip: bool,
}

/// Failures of the waitlist container itself.
///
/// These carry no event context; [`WaitlistError::at`] attaches it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitlistError {
    /// Nobody is waiting
    #[error("waitlist is empty")]
    Empty,
    /// Participant is already queued
    #[error("participant {0} is already waitlisted")]
    Duplicate(ParticipantId),
    /// Participant is not queued
    #[error("participant {0} is not waitlisted")]
    Absent(ParticipantId),
}

impl WaitlistError {
    /// Converts into the enrollment error for the waitlist of `event`
    #[must_use]
    pub const fn at(self, event: EventId) -> EnrollmentError {
        match self {
            Self::Empty => EnrollmentError::EmptyWaitlist { event },
            Self::Duplicate(participant) => EnrollmentError::AlreadyWaitlisted { event, participant },
            Self::Absent(participant) => EnrollmentError::NotWaitlisted { event, participant },
        }
    }
}

/// Waitlist of an event, highest priority first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitlistQueue {
    entries: Vec<WaitlistEntry>,
}

impl WaitlistQueue {
    /// Creates an empty waitlist
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Queues `participant` according to its priority.
    ///
    /// A VIP goes immediately before the first non-VIP entry; everyone else
    /// is appended.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::Duplicate`] if the participant is already queued.
    pub fn insert(&mut self, participant: ParticipantId, vip: bool) -> Result<(), WaitlistError> {
        if self.contains(&participant) {
            return Err(WaitlistError::Duplicate(participant));
        }

        let entry = WaitlistEntry { participant, vip };
        let position = if vip {
            self.entries
                .iter()
                .position(|queued| !queued.vip)
                .unwrap_or(self.entries.len())
        } else {
            self.entries.len()
        };
        self.entries.insert(position, entry);
        Ok(())
    }

    /// Removes and returns the highest-priority participant.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::Empty`] if nobody is waiting.
    pub fn promote_front(&mut self) -> Result<ParticipantId, WaitlistError> {
        if self.entries.is_empty() {
            return Err(WaitlistError::Empty);
        }
        Ok(self.entries.remove(0).participant)
    }

    /// Removes a specific participant, keeping everyone else in place.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::Absent`] if the participant is not queued.
    pub fn remove(&mut self, participant: &ParticipantId) -> Result<(), WaitlistError> {
        let position = self
            .entries
            .iter()
            .position(|queued| queued.participant == *participant)
            .ok_or(WaitlistError::Absent(*participant))?;
        self.entries.remove(position);
        Ok(())
    }

    /// Whether `participant` is queued
    #[must_use]
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.entries.iter().any(|queued| queued.participant == *participant)
    }

    /// Participant at the front, if any
    #[must_use]
    pub fn front(&self) -> Option<ParticipantId> {
        self.entries.first().map(|entry| entry.participant)
    }

    /// Number of waiting participants
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued participant ids in priority order
    #[must_use]
    pub fn ids(&self) -> Vec<ParticipantId> {
        self.entries.iter().map(|entry| entry.participant).collect()
    }

    /// Queued entries in priority order
    #[must_use]
    pub fn entries(&self) -> &[WaitlistEntry] {
        &self.entries
    }

    /// Whether every VIP entry precedes every non-VIP entry
    #[must_use]
    pub fn is_priority_ordered(&self) -> bool {
        self.entries
            .iter()
            .skip_while(|entry| entry.vip)
            .all(|entry| !entry.vip)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ParticipantId> {
        (0..n).map(|_| ParticipantId::new()).collect()
    }

    #[test]
    fn vip_jumps_ahead_of_regular_entries() {
        let [a, b, c, d] = ids(4).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        queue.insert(a, false).unwrap();
        queue.insert(b, false).unwrap();

        queue.insert(c, true).unwrap();
        assert_eq!(queue.ids(), vec![c, a, b]);

        queue.insert(d, true).unwrap();
        assert_eq!(queue.ids(), vec![c, d, a, b]);
        assert!(queue.is_priority_ordered());
    }

    #[test]
    fn vip_into_all_vip_queue_appends() {
        let [a, b] = ids(2).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        queue.insert(a, true).unwrap();
        queue.insert(b, true).unwrap();
        assert_eq!(queue.ids(), vec![a, b]);
    }

    #[test]
    fn regular_entry_always_appends() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        queue.insert(a, true).unwrap();
        queue.insert(b, false).unwrap();
        queue.insert(c, false).unwrap();
        assert_eq!(queue.ids(), vec![a, b, c]);
    }

    #[test]
    fn duplicate_insert_is_rejected_without_change() {
        let [a, b] = ids(2).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        queue.insert(a, false).unwrap();
        queue.insert(b, false).unwrap();
        let before = queue.clone();

        assert_eq!(queue.insert(a, true), Err(WaitlistError::Duplicate(a)));
        assert_eq!(queue, before);
    }

    #[test]
    fn promote_front_is_fifo_within_priority() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        queue.insert(a, false).unwrap();
        queue.insert(b, true).unwrap();
        queue.insert(c, false).unwrap();

        assert_eq!(queue.promote_front(), Ok(b));
        assert_eq!(queue.promote_front(), Ok(a));
        assert_eq!(queue.promote_front(), Ok(c));
        assert_eq!(queue.promote_front(), Err(WaitlistError::Empty));
    }

    #[test]
    fn remove_keeps_relative_order() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut queue = WaitlistQueue::new();
        for id in [a, b, c] {
            queue.insert(id, false).unwrap();
        }
        queue.remove(&b).unwrap();
        assert_eq!(queue.ids(), vec![a, c]);
        assert_eq!(queue.remove(&b), Err(WaitlistError::Absent(b)));
    }

    #[test]
    fn errors_pick_up_event_context() {
        let event = EventId::new();
        let who = ParticipantId::new();
        assert_eq!(
            WaitlistError::Absent(who).at(event),
            EnrollmentError::NotWaitlisted {
                event,
                participant: who
            }
        );
        assert_eq!(
            WaitlistError::Empty.at(event),
            EnrollmentError::EmptyWaitlist { event }
        );
    }
}
