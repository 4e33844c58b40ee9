//! Admission rules.
//!
//! Every check is a pure function of the records passed in. The `check_*`
//! functions say *why* a request is rejected; the `can_*` functions collapse
//! that to a boolean for listing screens and filters.

use crate::error::EnrollmentError;
use crate::types::{Capacity, Event, EventKind, NewEvent, Participant, ParticipantId, Role, Room};

/// Decides whether a participant may be admitted, waitlisted or removed.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapacityPolicy;

impl CapacityPolicy {
    /// Whether `participant` may be added to the roster of `event`.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::AlreadyEnrolled`] / [`EnrollmentError::AlreadyWaitlisted`]
    ///   if the participant is already involved
    /// - [`EnrollmentError::SpeakerOfEvent`] if the participant speaks at the event
    /// - [`EnrollmentError::VipOnlyEvent`] if the event is VIP-only and the participant is not
    /// - [`EnrollmentError::CapacityFull`] if no seat is left
    pub fn check_enroll(event: &Event, participant: &Participant) -> Result<(), EnrollmentError> {
        Self::check_not_involved(event, participant)?;
        if !event.has_open_seat() {
            return Err(EnrollmentError::CapacityFull {
                event: event.id,
                capacity: event.capacity,
            });
        }
        Ok(())
    }

    /// Boolean form of [`Self::check_enroll`]; a missing event is never enrollable.
    #[must_use]
    pub fn can_enroll(event: Option<&Event>, participant: &Participant) -> bool {
        event.is_some_and(|event| Self::check_enroll(event, participant).is_ok())
    }

    /// Whether `participant` may queue for `event`.
    ///
    /// The waitlist is only meaningful once every seat is taken.
    ///
    /// # Errors
    ///
    /// Same involvement and eligibility failures as [`Self::check_enroll`], plus
    /// [`EnrollmentError::SeatsAvailable`] while the event still has room.
    pub fn check_join_waitlist(
        event: &Event,
        participant: &Participant,
    ) -> Result<(), EnrollmentError> {
        Self::check_not_involved(event, participant)?;
        if event.has_open_seat() {
            return Err(EnrollmentError::SeatsAvailable {
                event: event.id,
                open_seats: event.open_seats(),
            });
        }
        Ok(())
    }

    /// Boolean form of [`Self::check_join_waitlist`].
    #[must_use]
    pub fn can_join_waitlist(event: Option<&Event>, participant: &Participant) -> bool {
        event.is_some_and(|event| Self::check_join_waitlist(event, participant).is_ok())
    }

    /// Whether `participant` may give up its seat.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollmentError::NotEnrolled`] unless the participant is on the roster.
    pub fn check_cancel(event: &Event, participant: &ParticipantId) -> Result<(), EnrollmentError> {
        if event.is_signed_up(participant) {
            Ok(())
        } else {
            Err(EnrollmentError::NotEnrolled {
                event: event.id,
                participant: *participant,
            })
        }
    }

    /// Boolean form of [`Self::check_cancel`].
    #[must_use]
    pub fn can_cancel(event: Option<&Event>, participant: &ParticipantId) -> bool {
        event.is_some_and(|event| event.is_signed_up(participant))
    }

    /// Whether `participant` may leave the waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollmentError::NotWaitlisted`] unless the participant is queued.
    pub fn check_leave_waitlist(
        event: &Event,
        participant: &ParticipantId,
    ) -> Result<(), EnrollmentError> {
        if event.is_waitlisted(participant) {
            Ok(())
        } else {
            Err(EnrollmentError::NotWaitlisted {
                event: event.id,
                participant: *participant,
            })
        }
    }

    /// Boolean form of [`Self::check_leave_waitlist`].
    #[must_use]
    pub fn can_leave_waitlist(event: Option<&Event>, participant: &ParticipantId) -> bool {
        event.is_some_and(|event| event.is_waitlisted(participant))
    }

    /// Whether `event` may be resized to `requested` inside a room of `room_capacity`.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::InvalidCapacity`] for zero
    /// - [`EnrollmentError::CapacityAboveRoomLimit`] if the room is too small
    /// - [`EnrollmentError::CapacityBelowEnrolledCount`] if enrolled participants would not fit
    pub fn check_capacity_change(
        event: &Event,
        requested: Capacity,
        room_capacity: Capacity,
    ) -> Result<(), EnrollmentError> {
        if requested.value() == 0 {
            return Err(EnrollmentError::InvalidCapacity);
        }
        if requested > room_capacity {
            return Err(EnrollmentError::CapacityAboveRoomLimit {
                requested,
                room_capacity,
            });
        }
        if requested.as_usize() < event.signed_up.len() {
            return Err(EnrollmentError::CapacityBelowEnrolledCount {
                requested,
                enrolled: event.signed_up.len(),
            });
        }
        Ok(())
    }

    /// Whether a new event can be scheduled in `room` next to the `existing` events.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::InvalidSchedule`] if the event does not end after it starts
    /// - [`EnrollmentError::InvalidCapacity`] / [`EnrollmentError::CapacityAboveRoomLimit`]
    /// - [`EnrollmentError::RoomUnavailable`] on a time clash in the same room
    /// - [`EnrollmentError::SpeakerUnavailable`] if a listed speaker is booked elsewhere
    pub fn check_new_event(
        spec: &NewEvent,
        room: &Room,
        existing: &[Event],
    ) -> Result<(), EnrollmentError> {
        if spec.ends_at <= spec.starts_at {
            return Err(EnrollmentError::InvalidSchedule);
        }
        if spec.capacity.value() == 0 {
            return Err(EnrollmentError::InvalidCapacity);
        }
        if spec.capacity > room.capacity {
            return Err(EnrollmentError::CapacityAboveRoomLimit {
                requested: spec.capacity,
                room_capacity: room.capacity,
            });
        }

        let overlapping = existing
            .iter()
            .filter(|other| other.overlaps(spec.starts_at, spec.ends_at));
        for other in overlapping {
            if other.room_id == room.id {
                return Err(EnrollmentError::RoomUnavailable {
                    room: room.id,
                    conflicting: other.id,
                });
            }
            if let Some(speaker) = spec.kind.speakers().iter().find(|s| other.is_speaker(s)) {
                return Err(EnrollmentError::SpeakerUnavailable {
                    speaker: *speaker,
                    conflicting: other.id,
                });
            }
        }
        Ok(())
    }

    /// Whether `speaker` may be assigned to speak at `event`.
    ///
    /// `others` are the remaining events, used to detect double-booking.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::NotASpeaker`] if the account lacks the speaker role
    /// - [`EnrollmentError::NoSpeakerSlots`] for events without speakers
    /// - [`EnrollmentError::SpeakerIsParticipant`] if the speaker is enrolled or waiting
    /// - [`EnrollmentError::SpeakerUnavailable`] if the speaker is booked at an overlapping event
    pub fn check_speaker_assignment(
        event: &Event,
        speaker: &Participant,
        others: &[Event],
    ) -> Result<(), EnrollmentError> {
        if speaker.role != Role::Speaker {
            return Err(EnrollmentError::NotASpeaker(speaker.id));
        }
        if matches!(event.kind, EventKind::NoSpeaker) {
            return Err(EnrollmentError::NoSpeakerSlots { event: event.id });
        }
        if event.is_signed_up(&speaker.id) || event.is_waitlisted(&speaker.id) {
            return Err(EnrollmentError::SpeakerIsParticipant {
                event: event.id,
                participant: speaker.id,
            });
        }
        if let Some(conflict) = others.iter().find(|other| {
            other.id != event.id
                && other.is_speaker(&speaker.id)
                && other.overlaps(event.starts_at, event.ends_at)
        }) {
            return Err(EnrollmentError::SpeakerUnavailable {
                speaker: speaker.id,
                conflicting: conflict.id,
            });
        }
        Ok(())
    }

    // Shared by enroll and waitlist: the participant must be a stranger to the
    // event and allowed in at all.
    fn check_not_involved(event: &Event, participant: &Participant) -> Result<(), EnrollmentError> {
        if event.is_signed_up(&participant.id) {
            return Err(EnrollmentError::AlreadyEnrolled {
                event: event.id,
                participant: participant.id,
            });
        }
        if event.is_waitlisted(&participant.id) {
            return Err(EnrollmentError::AlreadyWaitlisted {
                event: event.id,
                participant: participant.id,
            });
        }
        if event.is_speaker(&participant.id) {
            return Err(EnrollmentError::SpeakerOfEvent {
                event: event.id,
                participant: participant.id,
            });
        }
        if event.vip_only && !participant.is_vip() {
            return Err(EnrollmentError::VipOnlyEvent {
                event: event.id,
                participant: participant.id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::RoomId;
    use chrono::{Duration, TimeZone, Utc};

    fn event(capacity: u32) -> Event {
        let starts_at = Utc.with_ymd_and_hms(2025, 11, 14, 18, 0, 0).unwrap();
        Event::new(NewEvent {
            title: "Lightning talks".to_string(),
            room_id: RoomId::new(),
            starts_at,
            ends_at: starts_at + Duration::hours(2),
            capacity: Capacity::new(capacity),
            vip_only: false,
            kind: EventKind::MultiSpeaker(Vec::new()),
        })
    }

    fn attendee(vip: bool) -> Participant {
        Participant::new("Ada", Role::Attendee, vip)
    }

    #[test]
    fn enroll_rejected_when_full() {
        let mut event = event(1);
        event.signed_up.push(ParticipantId::new());
        let newcomer = attendee(false);

        assert_eq!(
            CapacityPolicy::check_enroll(&event, &newcomer),
            Err(EnrollmentError::CapacityFull {
                event: event.id,
                capacity: Capacity::new(1)
            })
        );
        assert!(!CapacityPolicy::can_enroll(Some(&event), &newcomer));
    }

    #[test]
    fn enroll_rejects_duplicates_before_capacity() {
        let mut event = event(1);
        let member = attendee(false);
        event.signed_up.push(member.id);

        // Full and already enrolled: the more specific reason wins.
        assert!(matches!(
            CapacityPolicy::check_enroll(&event, &member),
            Err(EnrollmentError::AlreadyEnrolled { .. })
        ));
    }

    #[test]
    fn enroll_rejects_waitlisted_participant() {
        let mut event = event(1);
        event.signed_up.push(ParticipantId::new());
        let waiting = attendee(false);
        event.waitlist.insert(waiting.id, false).unwrap();

        assert!(matches!(
            CapacityPolicy::check_enroll(&event, &waiting),
            Err(EnrollmentError::AlreadyWaitlisted { .. })
        ));
    }

    #[test]
    fn missing_event_is_never_admissible() {
        let who = attendee(true);
        assert!(!CapacityPolicy::can_enroll(None, &who));
        assert!(!CapacityPolicy::can_join_waitlist(None, &who));
        assert!(!CapacityPolicy::can_cancel(None, &who.id));
        assert!(!CapacityPolicy::can_leave_waitlist(None, &who.id));
    }

    #[test]
    fn vip_only_gate() {
        let mut event = event(5);
        event.vip_only = true;

        assert!(matches!(
            CapacityPolicy::check_enroll(&event, &attendee(false)),
            Err(EnrollmentError::VipOnlyEvent { .. })
        ));
        assert!(CapacityPolicy::check_enroll(&event, &attendee(true)).is_ok());
    }

    #[test]
    fn speaker_cannot_attend_own_event() {
        let mut event = event(5);
        let speaker = Participant::new("Grace", Role::Speaker, false);
        event.kind = EventKind::MultiSpeaker(vec![speaker.id]);

        assert!(matches!(
            CapacityPolicy::check_enroll(&event, &speaker),
            Err(EnrollmentError::SpeakerOfEvent { .. })
        ));
    }

    #[test]
    fn waitlist_only_opens_when_full() {
        let mut event = event(2);
        event.signed_up.push(ParticipantId::new());
        let who = attendee(false);

        assert_eq!(
            CapacityPolicy::check_join_waitlist(&event, &who),
            Err(EnrollmentError::SeatsAvailable {
                event: event.id,
                open_seats: 1
            })
        );

        event.signed_up.push(ParticipantId::new());
        assert!(CapacityPolicy::can_join_waitlist(Some(&event), &who));
    }

    #[test]
    fn waitlist_respects_vip_gate() {
        let mut event = event(1);
        event.vip_only = true;
        event.signed_up.push(ParticipantId::new());

        assert!(matches!(
            CapacityPolicy::check_join_waitlist(&event, &attendee(false)),
            Err(EnrollmentError::VipOnlyEvent { .. })
        ));
        assert!(CapacityPolicy::check_join_waitlist(&event, &attendee(true)).is_ok());
    }

    #[test]
    fn cancel_and_leave_require_membership() {
        let mut event = event(1);
        let member = attendee(false);
        event.signed_up.push(member.id);

        assert!(CapacityPolicy::check_cancel(&event, &member.id).is_ok());
        assert!(matches!(
            CapacityPolicy::check_leave_waitlist(&event, &member.id),
            Err(EnrollmentError::NotWaitlisted { .. })
        ));

        let stranger = ParticipantId::new();
        assert!(matches!(
            CapacityPolicy::check_cancel(&event, &stranger),
            Err(EnrollmentError::NotEnrolled { .. })
        ));
    }

    #[test]
    fn capacity_change_bounds() {
        let mut event = event(3);
        for _ in 0..3 {
            event.signed_up.push(ParticipantId::new());
        }
        let room = Capacity::new(10);

        assert_eq!(
            CapacityPolicy::check_capacity_change(&event, Capacity::new(2), room),
            Err(EnrollmentError::CapacityBelowEnrolledCount {
                requested: Capacity::new(2),
                enrolled: 3
            })
        );
        assert_eq!(
            CapacityPolicy::check_capacity_change(&event, Capacity::new(11), room),
            Err(EnrollmentError::CapacityAboveRoomLimit {
                requested: Capacity::new(11),
                room_capacity: room
            })
        );
        assert_eq!(
            CapacityPolicy::check_capacity_change(&event, Capacity::new(0), room),
            Err(EnrollmentError::InvalidCapacity)
        );
        assert!(CapacityPolicy::check_capacity_change(&event, Capacity::new(3), room).is_ok());
        assert!(CapacityPolicy::check_capacity_change(&event, Capacity::new(10), room).is_ok());
    }

    #[test]
    fn new_event_room_clash() {
        let existing = event(5);
        let room = Room {
            id: existing.room_id,
            number: "BA1160".to_string(),
            capacity: Capacity::new(50),
        };
        let clash = NewEvent {
            title: "Overlapping".to_string(),
            room_id: room.id,
            starts_at: existing.starts_at + Duration::hours(1),
            ends_at: existing.ends_at + Duration::hours(1),
            capacity: Capacity::new(10),
            vip_only: false,
            kind: EventKind::NoSpeaker,
        };

        assert_eq!(
            CapacityPolicy::check_new_event(&clash, &room, std::slice::from_ref(&existing)),
            Err(EnrollmentError::RoomUnavailable {
                room: room.id,
                conflicting: existing.id
            })
        );

        let after = NewEvent {
            starts_at: existing.ends_at,
            ends_at: existing.ends_at + Duration::hours(1),
            ..clash
        };
        assert!(CapacityPolicy::check_new_event(&after, &room, &[existing]).is_ok());
    }

    #[test]
    fn new_event_schedule_and_capacity() {
        let room = Room::new("BA1170", Capacity::new(20));
        let starts_at = Utc.with_ymd_and_hms(2025, 11, 15, 9, 0, 0).unwrap();
        let spec = NewEvent {
            title: "Backwards".to_string(),
            room_id: room.id,
            starts_at,
            ends_at: starts_at,
            capacity: Capacity::new(10),
            vip_only: false,
            kind: EventKind::NoSpeaker,
        };
        assert_eq!(
            CapacityPolicy::check_new_event(&spec, &room, &[]),
            Err(EnrollmentError::InvalidSchedule)
        );

        let too_big = NewEvent {
            ends_at: starts_at + Duration::hours(1),
            capacity: Capacity::new(21),
            ..spec
        };
        assert!(matches!(
            CapacityPolicy::check_new_event(&too_big, &room, &[]),
            Err(EnrollmentError::CapacityAboveRoomLimit { .. })
        ));
    }

    #[test]
    fn speaker_assignment_rules() {
        let mut talk = event(5);
        talk.kind = EventKind::OneSpeaker(None);
        let speaker = Participant::new("Grace", Role::Speaker, false);
        let attendee = attendee(false);

        assert_eq!(
            CapacityPolicy::check_speaker_assignment(&talk, &attendee, &[]),
            Err(EnrollmentError::NotASpeaker(attendee.id))
        );
        assert!(CapacityPolicy::check_speaker_assignment(&talk, &speaker, &[]).is_ok());

        let mut elsewhere = event(5);
        elsewhere.kind = EventKind::OneSpeaker(Some(speaker.id));
        assert!(matches!(
            CapacityPolicy::check_speaker_assignment(&talk, &speaker, &[elsewhere]),
            Err(EnrollmentError::SpeakerUnavailable { .. })
        ));

        let mut party = event(5);
        party.kind = EventKind::NoSpeaker;
        assert!(matches!(
            CapacityPolicy::check_speaker_assignment(&party, &speaker, &[]),
            Err(EnrollmentError::NoSpeakerSlots { .. })
        ));
    }
}
