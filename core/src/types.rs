//! Domain types for conference enrollment.
//!
//! An [`Event`] owns its roster (`signed_up`) and its priority-ordered
//! [`WaitlistQueue`]. A [`Participant`] owns the mirror image: the sets of
//! events it is enrolled in or waiting on. The two are persisted as separate
//! aggregates, so the runtime crate is responsible for keeping them in step.

use crate::waitlist::WaitlistQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner `Uuid`
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an event
    EventId
);
define_id!(
    /// Unique identifier for a participant account
    ParticipantId
);
define_id!(
    /// Unique identifier for a room
    RoomId
);

// ============================================================================
// Capacity
// ============================================================================

/// Maximum number of simultaneously enrolled participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capacity(pub u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the capacity as a `usize` for comparisons against roster lengths
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Whether one more participant fits when `occupied` seats are taken.
    ///
    /// Admission is strictly below capacity: a capacity of 3 admits the
    /// occupants numbered 1, 2 and 3, and rejects the fourth.
    #[must_use]
    pub const fn admits(&self, occupied: usize) -> bool {
        occupied < self.as_usize()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Rooms
// ============================================================================

/// A physical room that hosts events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique room identifier
    pub id: RoomId,
    /// Human-facing room number (e.g. "BA1160")
    pub number: String,
    /// Seats available in the room; upper bound for any hosted event
    pub capacity: Capacity,
}

impl Room {
    /// Creates a new `Room` with a fresh identifier
    #[must_use]
    pub fn new(number: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            id: RoomId::new(),
            number: number.into(),
            capacity,
        }
    }
}

// ============================================================================
// Participants
// ============================================================================

/// Account role. VIP status is orthogonal and carried as a flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Regular conference attendee
    Attendee,
    /// Gives talks; may be assigned to events
    Speaker,
    /// Organizes events
    Organizer,
}

/// A participant and the events it is involved in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique participant identifier
    pub id: ParticipantId,
    /// Display name
    pub name: String,
    /// Account role
    pub role: Role,
    /// VIP accounts may join VIP-only events and jump the waitlist
    pub vip: bool,
    /// Events the participant is currently signed up for
    pub enrolled_events: BTreeSet<EventId>,
    /// Events the participant is currently waiting on
    pub waitlisted_events: BTreeSet<EventId>,
}

impl Participant {
    /// Creates a participant with no memberships
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role, vip: bool) -> Self {
        Self {
            id: ParticipantId::new(),
            name: name.into(),
            role,
            vip,
            enrolled_events: BTreeSet::new(),
            waitlisted_events: BTreeSet::new(),
        }
    }

    /// Whether the participant holds a VIP account
    #[must_use]
    pub const fn is_vip(&self) -> bool {
        self.vip
    }

    /// Whether the participant believes it is enrolled in `event_id`
    #[must_use]
    pub fn is_enrolled_in(&self, event_id: &EventId) -> bool {
        self.enrolled_events.contains(event_id)
    }

    /// Whether the participant believes it is waiting on `event_id`
    #[must_use]
    pub fn is_waitlisted_on(&self, event_id: &EventId) -> bool {
        self.waitlisted_events.contains(event_id)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Speaker arrangement of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Parties, receptions: nobody speaks
    NoSpeaker,
    /// Talks: a single speaker slot, possibly not yet filled
    OneSpeaker(Option<ParticipantId>),
    /// Panels: any number of speakers
    MultiSpeaker(Vec<ParticipantId>),
}

impl EventKind {
    /// Speakers currently assigned to the event
    #[must_use]
    pub fn speakers(&self) -> &[ParticipantId] {
        match self {
            Self::NoSpeaker | Self::OneSpeaker(None) => &[],
            Self::OneSpeaker(Some(speaker)) => std::slice::from_ref(speaker),
            Self::MultiSpeaker(speakers) => speakers,
        }
    }
}

/// A capacity-bounded event with a roster and a waitlist.
///
/// Invariants maintained by the enrollment service:
/// - `signed_up.len() <= capacity`
/// - `signed_up` and `waitlist` are disjoint and free of duplicates
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Event title
    pub title: String,
    /// Hosting room
    pub room_id: RoomId,
    /// Start of the event
    pub starts_at: DateTime<Utc>,
    /// End of the event
    pub ends_at: DateTime<Utc>,
    /// Maximum number of enrolled participants
    pub capacity: Capacity,
    /// Enrolled participants, in enrollment order
    pub signed_up: Vec<ParticipantId>,
    /// Waiting participants, in priority order
    pub waitlist: WaitlistQueue,
    /// Only VIP participants may enroll or wait
    pub vip_only: bool,
    /// Speaker arrangement
    pub kind: EventKind,
}

impl Event {
    /// Creates an event with an empty roster and waitlist
    #[must_use]
    pub fn new(spec: NewEvent) -> Self {
        Self {
            id: EventId::new(),
            title: spec.title,
            room_id: spec.room_id,
            starts_at: spec.starts_at,
            ends_at: spec.ends_at,
            capacity: spec.capacity,
            signed_up: Vec::new(),
            waitlist: WaitlistQueue::new(),
            vip_only: spec.vip_only,
            kind: spec.kind,
        }
    }

    /// Whether `participant_id` is on the roster
    #[must_use]
    pub fn is_signed_up(&self, participant_id: &ParticipantId) -> bool {
        self.signed_up.contains(participant_id)
    }

    /// Whether `participant_id` is on the waitlist
    #[must_use]
    pub fn is_waitlisted(&self, participant_id: &ParticipantId) -> bool {
        self.waitlist.contains(participant_id)
    }

    /// Whether `participant_id` is assigned to speak at this event
    #[must_use]
    pub fn is_speaker(&self, participant_id: &ParticipantId) -> bool {
        self.kind.speakers().contains(participant_id)
    }

    /// Whether another participant can be admitted to the roster
    #[must_use]
    pub const fn has_open_seat(&self) -> bool {
        self.capacity.admits(self.signed_up.len())
    }

    /// Number of seats still free
    #[must_use]
    pub const fn open_seats(&self) -> usize {
        self.capacity.as_usize().saturating_sub(self.signed_up.len())
    }

    /// Whether this event overlaps the half-open range `[starts_at, ends_at)`
    #[must_use]
    pub fn overlaps(&self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> bool {
        self.starts_at < ends_at && starts_at < self.ends_at
    }

    /// Snapshot of roster and waitlist
    #[must_use]
    pub fn roster(&self) -> Roster {
        Roster {
            signed_up: self.signed_up.clone(),
            waitlist: self.waitlist.ids(),
        }
    }
}

/// Parameters for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event title
    pub title: String,
    /// Hosting room
    pub room_id: RoomId,
    /// Start of the event
    pub starts_at: DateTime<Utc>,
    /// End of the event
    pub ends_at: DateTime<Utc>,
    /// Requested capacity; must not exceed the room's capacity
    pub capacity: Capacity,
    /// Restrict enrollment to VIP participants
    #[serde(default)]
    pub vip_only: bool,
    /// Speaker arrangement
    pub kind: EventKind,
}

/// Read-only view of who is in and who is waiting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Enrolled participants, in enrollment order
    pub signed_up: Vec<ParticipantId>,
    /// Waiting participants, in priority order
    pub waitlist: Vec<ParticipantId>,
}
