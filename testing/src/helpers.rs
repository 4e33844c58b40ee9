//! Builders and invariant checks for enrollment tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use conclave_core::{Capacity, Event, EventId, EventKind, NewEvent, Participant, ParticipantId, RoomId};
use std::collections::HashSet;

/// Opening of the test conference (2025-01-01 09:00:00 UTC)
#[must_use]
pub fn conference_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Fluent builder for [`NewEvent`].
///
/// Defaults to a one-hour, no-speaker event at [`conference_start`] with
/// capacity 10.
///
/// # Example
///
/// ```
/// use conclave_testing::EventBuilder;
/// use conclave_core::RoomId;
///
/// let spec = EventBuilder::new(RoomId::new())
///     .title("Rust in Production")
///     .capacity(2)
///     .at_hour(3)
///     .vip_only()
///     .build();
/// assert_eq!(spec.capacity.value(), 2);
/// assert!(spec.vip_only);
/// ```
#[derive(Clone, Debug)]
pub struct EventBuilder {
    spec: NewEvent,
}

impl EventBuilder {
    /// Start building an event in `room_id`
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        let starts_at = conference_start();
        Self {
            spec: NewEvent {
                title: "Session".to_string(),
                room_id,
                starts_at,
                ends_at: starts_at + Duration::hours(1),
                capacity: Capacity::new(10),
                vip_only: false,
                kind: EventKind::NoSpeaker,
            },
        }
    }

    /// Set the title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.spec.title = title.into();
        self
    }

    /// Set the capacity
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.spec.capacity = Capacity::new(capacity);
        self
    }

    /// Start `hours` after [`conference_start`], keeping the duration
    #[must_use]
    pub fn at_hour(mut self, hours: i64) -> Self {
        let length = self.spec.ends_at - self.spec.starts_at;
        self.spec.starts_at = conference_start() + Duration::hours(hours);
        self.spec.ends_at = self.spec.starts_at + length;
        self
    }

    /// Set the duration
    #[must_use]
    pub fn lasting(mut self, length: Duration) -> Self {
        self.spec.ends_at = self.spec.starts_at + length;
        self
    }

    /// Restrict to VIP participants
    #[must_use]
    pub fn vip_only(mut self) -> Self {
        self.spec.vip_only = true;
        self
    }

    /// Set the speaker arrangement
    #[must_use]
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.spec.kind = kind;
        self
    }

    /// Finish as creation parameters
    #[must_use]
    pub fn build(self) -> NewEvent {
        self.spec
    }

    /// Finish as a stored event with an empty roster
    #[must_use]
    pub fn build_event(self) -> Event {
        Event::new(self.spec)
    }
}

/// Every way the given records break the enrollment invariants.
///
/// Checks, per event: roster within capacity, no duplicates, roster and
/// waitlist disjoint, VIP block ahead of everyone else. Across aggregates:
/// membership sets of participants agree with rosters and waitlists.
#[must_use]
pub fn consistency_violations(events: &[Event], participants: &[Participant]) -> Vec<String> {
    let mut violations = Vec::new();
    let known: HashSet<EventId> = events.iter().map(|event| event.id).collect();

    for event in events {
        let id = event.id;
        if event.signed_up.len() > event.capacity.as_usize() {
            violations.push(format!(
                "event {id}: {} enrolled exceeds capacity {}",
                event.signed_up.len(),
                event.capacity
            ));
        }
        let roster: HashSet<ParticipantId> = event.signed_up.iter().copied().collect();
        if roster.len() != event.signed_up.len() {
            violations.push(format!("event {id}: duplicate roster entry"));
        }
        let waiting: HashSet<ParticipantId> = event.waitlist.ids().into_iter().collect();
        if waiting.len() != event.waitlist.len() {
            violations.push(format!("event {id}: duplicate waitlist entry"));
        }
        if let Some(both) = roster.intersection(&waiting).next() {
            violations.push(format!("event {id}: {both} both enrolled and waiting"));
        }
        if !event.waitlist.is_priority_ordered() {
            violations.push(format!("event {id}: non-VIP entry ahead of a VIP entry"));
        }

        for participant in participants {
            let pid = participant.id;
            if roster.contains(&pid) != participant.is_enrolled_in(&id) {
                violations.push(format!("enrollment of {pid} in {id} disagrees"));
            }
            if waiting.contains(&pid) != participant.is_waitlisted_on(&id) {
                violations.push(format!("waitlisting of {pid} on {id} disagrees"));
            }
        }
    }

    for participant in participants {
        let dangling = participant
            .enrolled_events
            .iter()
            .chain(&participant.waitlisted_events)
            .find(|event_id| !known.contains(*event_id));
        if let Some(event_id) = dangling {
            violations.push(format!("{} references missing event {event_id}", participant.id));
        }
    }

    violations
}

/// Assert that the given records satisfy every enrollment invariant.
///
/// # Panics
///
/// Panics listing each violation found by [`consistency_violations`].
pub fn assert_consistent(events: &[Event], participants: &[Participant]) {
    let violations = consistency_violations(events, participants);
    assert!(
        violations.is_empty(),
        "enrollment invariants violated:\n  {}",
        violations.join("\n  ")
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conclave_core::Role;

    #[test]
    fn builder_keeps_duration_when_moved() {
        let spec = EventBuilder::new(RoomId::new())
            .lasting(Duration::minutes(30))
            .at_hour(2)
            .build();
        assert_eq!(spec.starts_at, conference_start() + Duration::hours(2));
        assert_eq!(spec.ends_at - spec.starts_at, Duration::minutes(30));
    }

    #[test]
    fn detects_one_sided_enrollment() {
        let mut event = EventBuilder::new(RoomId::new()).capacity(1).build_event();
        let ada = Participant::new("Ada", Role::Attendee, false);
        event.signed_up.push(ada.id);

        let violations = consistency_violations(&[event.clone()], &[ada.clone()]);
        assert_eq!(violations.len(), 1);

        let mut enrolled = ada;
        enrolled.enrolled_events.insert(event.id);
        assert!(consistency_violations(&[event], &[enrolled]).is_empty());
    }

    #[test]
    fn detects_overbooking_and_dangling_reference() {
        let mut event = EventBuilder::new(RoomId::new()).capacity(1).build_event();
        event.signed_up.push(ParticipantId::new());
        event.signed_up.push(ParticipantId::new());

        let mut ghost = Participant::new("Ghost", Role::Attendee, false);
        ghost.waitlisted_events.insert(EventId::new());

        let violations = consistency_violations(&[event], &[ghost]);
        assert!(violations.iter().any(|v| v.contains("exceeds capacity")));
        assert!(violations.iter().any(|v| v.contains("missing event")));
    }
}
