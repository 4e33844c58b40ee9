//! JSON seed data for the demo.
//!
//! Records refer to each other by human-facing keys (room numbers,
//! participant names, event titles). Everything goes through the
//! enrollment service, so a seed that breaks a rule is rejected with the
//! same error a live request would get.
//!
//! ```json
//! {
//!   "rooms": [{ "number": "BA1160", "capacity": 40 }],
//!   "participants": [{ "name": "Grace", "role": "Speaker" }],
//!   "events": [{
//!     "title": "Compilers 101",
//!     "room": "BA1160",
//!     "starts_at": "2025-01-01T09:00:00Z",
//!     "ends_at": "2025-01-01T10:00:00Z",
//!     "capacity": 30,
//!     "format": "one_speaker",
//!     "speakers": ["Grace"]
//!   }]
//! }
//! ```

use chrono::{DateTime, Utc};
use conclave_core::{
    Capacity, EnrollmentError, EventId, EventKind, NewEvent, ParticipantId, Role, Room, RoomId,
};
use conclave_runtime::EnrollmentService;
use conclave_testing::InMemoryGateway;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors from reading or applying a seed.
#[derive(Error, Debug)]
pub enum SeedError {
    /// The seed file could not be read
    #[error("failed to read seed file: {0}")]
    Read(#[from] std::io::Error),

    /// The seed is not valid JSON for [`Seed`]
    #[error("failed to parse seed: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two records share a key
    #[error("duplicate {kind} {key:?} in seed")]
    Duplicate {
        /// Record type
        kind: &'static str,
        /// Offending key
        key: String,
    },

    /// An event names a room that is not in the seed
    #[error("event {event:?} refers to unknown room {room:?}")]
    UnknownRoom {
        /// Event title
        event: String,
        /// Room number
        room: String,
    },

    /// An event names a participant that is not in the seed
    #[error("event {event:?} refers to unknown participant {name:?}")]
    UnknownParticipant {
        /// Event title
        event: String,
        /// Participant name
        name: String,
    },

    /// Speakers listed for an event whose format does not take them
    #[error("event {event:?} lists {count} speakers but its format allows {allowed}")]
    SpeakerCount {
        /// Event title
        event: String,
        /// Speakers listed
        count: usize,
        /// Speakers the format allows
        allowed: usize,
    },

    /// The enrollment service rejected a seeded record
    #[error("seed step {step:?} rejected: {source}")]
    Rejected {
        /// What was being seeded
        step: String,
        /// Service error
        #[source]
        source: EnrollmentError,
    },
}

/// Top-level seed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Rooms
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
    /// Participants
    #[serde(default)]
    pub participants: Vec<SeedParticipant>,
    /// Events, created in order
    #[serde(default)]
    pub events: Vec<SeedEvent>,
}

/// Seeded room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRoom {
    /// Room number, used as key
    pub number: String,
    /// Seats
    pub capacity: u32,
}

/// Seeded participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedParticipant {
    /// Display name, used as key
    pub name: String,
    /// Account role
    #[serde(default = "default_role")]
    pub role: Role,
    /// VIP flag
    #[serde(default)]
    pub vip: bool,
}

const fn default_role() -> Role {
    Role::Attendee
}

/// Speaker format of a seeded event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedFormat {
    /// No speakers
    #[default]
    NoSpeaker,
    /// At most one speaker
    OneSpeaker,
    /// Any number of speakers
    MultiSpeaker,
}

/// Seeded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEvent {
    /// Title, used as key
    pub title: String,
    /// Room number
    pub room: String,
    /// Start
    pub starts_at: DateTime<Utc>,
    /// End
    pub ends_at: DateTime<Utc>,
    /// Capacity
    pub capacity: u32,
    /// VIP-only flag
    #[serde(default)]
    pub vip_only: bool,
    /// Speaker format
    #[serde(default)]
    pub format: SeedFormat,
    /// Speaker names
    #[serde(default)]
    pub speakers: Vec<String>,
    /// Names signed up in order
    #[serde(default)]
    pub enrolled: Vec<String>,
    /// Names queued in order
    #[serde(default)]
    pub waitlisted: Vec<String>,
}

/// Ids assigned while seeding, by seed key.
#[derive(Debug, Clone, Default)]
pub struct SeededIds {
    /// Room number to id
    pub rooms: HashMap<String, RoomId>,
    /// Participant name to id
    pub participants: HashMap<String, ParticipantId>,
    /// Event title to id
    pub events: HashMap<String, EventId>,
}

impl Seed {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Read`] or [`SeedError::Parse`].
    pub async fn from_file(path: &Path) -> Result<Self, SeedError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Create every record of the seed.
    ///
    /// Rooms go straight into the directory; participants, events, speakers
    /// and memberships go through `service`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SeedError`] encountered. Records created before
    /// the failure are kept.
    pub async fn apply(
        &self,
        rooms: &InMemoryGateway,
        service: &EnrollmentService,
    ) -> Result<SeededIds, SeedError> {
        let mut ids = SeededIds::default();

        for room in &self.rooms {
            if ids.rooms.contains_key(&room.number) {
                return Err(SeedError::Duplicate {
                    kind: "room",
                    key: room.number.clone(),
                });
            }
            let id = rooms.add_room(Room::new(room.number.clone(), Capacity::new(room.capacity)));
            ids.rooms.insert(room.number.clone(), id);
        }

        for participant in &self.participants {
            if ids.participants.contains_key(&participant.name) {
                return Err(SeedError::Duplicate {
                    kind: "participant",
                    key: participant.name.clone(),
                });
            }
            let id = service
                .register_participant(participant.name.clone(), participant.role, participant.vip)
                .await
                .map_err(|source| SeedError::Rejected {
                    step: format!("register {}", participant.name),
                    source,
                })?;
            ids.participants.insert(participant.name.clone(), id);
        }

        for event in &self.events {
            if ids.events.contains_key(&event.title) {
                return Err(SeedError::Duplicate {
                    kind: "event",
                    key: event.title.clone(),
                });
            }
            let event_id = create(event, &ids, service).await?;
            ids.events.insert(event.title.clone(), event_id);

            for name in &event.enrolled {
                let participant = lookup(&ids, event, name)?;
                service
                    .sign_up(event_id, participant)
                    .await
                    .map_err(|source| SeedError::Rejected {
                        step: format!("enroll {name} in {}", event.title),
                        source,
                    })?;
            }
            for name in &event.waitlisted {
                let participant = lookup(&ids, event, name)?;
                service
                    .join_waitlist(event_id, participant)
                    .await
                    .map_err(|source| SeedError::Rejected {
                        step: format!("waitlist {name} on {}", event.title),
                        source,
                    })?;
            }
        }

        tracing::info!(
            rooms = ids.rooms.len(),
            participants = ids.participants.len(),
            events = ids.events.len(),
            "Seed applied"
        );
        Ok(ids)
    }
}

async fn create(
    event: &SeedEvent,
    ids: &SeededIds,
    service: &EnrollmentService,
) -> Result<EventId, SeedError> {
    let room_id = *ids.rooms.get(&event.room).ok_or_else(|| SeedError::UnknownRoom {
        event: event.title.clone(),
        room: event.room.clone(),
    })?;
    let speakers = event
        .speakers
        .iter()
        .map(|name| lookup(ids, event, name))
        .collect::<Result<Vec<_>, _>>()?;

    let kind = match (event.format, speakers.as_slice()) {
        (SeedFormat::NoSpeaker, []) => EventKind::NoSpeaker,
        (SeedFormat::OneSpeaker, []) => EventKind::OneSpeaker(None),
        (SeedFormat::OneSpeaker, [speaker]) => EventKind::OneSpeaker(Some(*speaker)),
        (SeedFormat::MultiSpeaker, _) => EventKind::MultiSpeaker(speakers.clone()),
        (format, listed) => {
            return Err(SeedError::SpeakerCount {
                event: event.title.clone(),
                count: listed.len(),
                allowed: usize::from(format == SeedFormat::OneSpeaker),
            });
        },
    };

    service
        .create_event(NewEvent {
            title: event.title.clone(),
            room_id,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            capacity: Capacity::new(event.capacity),
            vip_only: event.vip_only,
            kind,
        })
        .await
        .map_err(|source| SeedError::Rejected {
            step: format!("create {}", event.title),
            source,
        })
}

fn lookup(ids: &SeededIds, event: &SeedEvent, name: &str) -> Result<ParticipantId, SeedError> {
    ids.participants
        .get(name)
        .copied()
        .ok_or_else(|| SeedError::UnknownParticipant {
            event: event.title.clone(),
            name: name.to_string(),
        })
}
