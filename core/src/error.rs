//! Error types for enrollment and persistence.

use crate::types::{Capacity, EventId, ParticipantId, RoomId};
use thiserror::Error;

/// Errors reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The store could not be reached or timed out; retrying may succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl GatewayError {
    /// Whether re-issuing the same write may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Outcome of a rejected enrollment request.
///
/// Every variant except [`EnrollmentError::Storage`] and
/// [`EnrollmentError::InconsistentState`] is an expected business outcome
/// that left state untouched; callers can map each to its own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    /// No event with this id exists
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// No participant with this id exists
    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    /// No room with this id exists
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// Participant is already on the roster
    #[error("participant {participant} is already enrolled in event {event}")]
    AlreadyEnrolled {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Participant is already on the waitlist
    #[error("participant {participant} is already waitlisted for event {event}")]
    AlreadyWaitlisted {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Participant is not on the roster
    #[error("participant {participant} is not enrolled in event {event}")]
    NotEnrolled {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Participant is not on the waitlist
    #[error("participant {participant} is not waitlisted for event {event}")]
    NotWaitlisted {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Every seat is taken
    #[error("event {event} is full ({capacity} seats)")]
    CapacityFull {
        /// Event
        event: EventId,
        /// Current capacity
        capacity: Capacity,
    },

    /// The waitlist only opens once the event is full
    #[error("event {event} still has {open_seats} open seats")]
    SeatsAvailable {
        /// Event
        event: EventId,
        /// Seats still free
        open_seats: usize,
    },

    /// Non-VIP participant tried to join a VIP-only event
    #[error("event {event} is VIP-only; participant {participant} is not a VIP")]
    VipOnlyEvent {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Speakers cannot attend their own event as participants
    #[error("participant {participant} speaks at event {event}")]
    SpeakerOfEvent {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// Promotion was requested but nobody is waiting
    #[error("waitlist of event {event} is empty")]
    EmptyWaitlist {
        /// Event
        event: EventId,
    },

    /// Requested capacity does not fit in the hosting room
    #[error("capacity {requested} exceeds room capacity {room_capacity}")]
    CapacityAboveRoomLimit {
        /// Requested capacity
        requested: Capacity,
        /// Capacity of the hosting room
        room_capacity: Capacity,
    },

    /// Requested capacity would evict enrolled participants
    #[error("capacity {requested} is below the {enrolled} participants already enrolled")]
    CapacityBelowEnrolledCount {
        /// Requested capacity
        requested: Capacity,
        /// Participants currently enrolled
        enrolled: usize,
    },

    /// Capacity must be positive
    #[error("capacity must be at least 1")]
    InvalidCapacity,

    /// Event must end after it starts
    #[error("event must end after it starts")]
    InvalidSchedule,

    /// The room is booked by another event during the requested time
    #[error("room {room} is already booked by event {conflicting}")]
    RoomUnavailable {
        /// Room
        room: RoomId,
        /// Event holding the room
        conflicting: EventId,
    },

    /// A speaker is already booked at an overlapping event
    #[error("speaker {speaker} is already speaking at event {conflicting}")]
    SpeakerUnavailable {
        /// Speaker
        speaker: ParticipantId,
        /// Overlapping event
        conflicting: EventId,
    },

    /// The event has no speaker slot to fill
    #[error("event {event} does not take speakers")]
    NoSpeakerSlots {
        /// Event
        event: EventId,
    },

    /// Only accounts with the speaker role can be assigned to speak
    #[error("participant {0} is not a speaker")]
    NotASpeaker(ParticipantId),

    /// A participant of an event cannot also be its speaker
    #[error("participant {participant} is enrolled or waiting on event {event}")]
    SpeakerIsParticipant {
        /// Event
        event: EventId,
        /// Participant
        participant: ParticipantId,
    },

    /// The store failed before anything was committed
    #[error(transparent)]
    Storage(#[from] GatewayError),

    /// One aggregate was written but the other could not be brought in line
    #[error("inconsistent state for event {event}: {reason}")]
    InconsistentState {
        /// Event whose write sequence was interrupted
        event: EventId,
        /// Participant whose record is out of step, if a participant write failed
        participant: Option<ParticipantId>,
        /// Underlying failure
        reason: String,
    },
}

impl EnrollmentError {
    /// Whether this is a fault rather than an expected rejection
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::InconsistentState { .. })
    }

    /// Stable machine-readable label, used for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "event_not_found",
            Self::ParticipantNotFound(_) => "participant_not_found",
            Self::RoomNotFound(_) => "room_not_found",
            Self::AlreadyEnrolled { .. } => "already_enrolled",
            Self::AlreadyWaitlisted { .. } => "already_waitlisted",
            Self::NotEnrolled { .. } => "not_enrolled",
            Self::NotWaitlisted { .. } => "not_waitlisted",
            Self::CapacityFull { .. } => "capacity_full",
            Self::SeatsAvailable { .. } => "seats_available",
            Self::VipOnlyEvent { .. } => "vip_only_event",
            Self::SpeakerOfEvent { .. } => "speaker_of_event",
            Self::EmptyWaitlist { .. } => "empty_waitlist",
            Self::CapacityAboveRoomLimit { .. } => "capacity_above_room_limit",
            Self::CapacityBelowEnrolledCount { .. } => "capacity_below_enrolled_count",
            Self::InvalidCapacity => "invalid_capacity",
            Self::InvalidSchedule => "invalid_schedule",
            Self::RoomUnavailable { .. } => "room_unavailable",
            Self::SpeakerUnavailable { .. } => "speaker_unavailable",
            Self::NoSpeakerSlots { .. } => "no_speaker_slots",
            Self::NotASpeaker(_) => "not_a_speaker",
            Self::SpeakerIsParticipant { .. } => "speaker_is_participant",
            Self::Storage(_) => "storage",
            Self::InconsistentState { .. } => "inconsistent_state",
        }
    }
}
