//! In-memory gateway for enrollment tests
//!
//! Provides fast, deterministic storage for both aggregates plus the rooms
//! directory:
//! - [`InMemoryGateway`]: `HashMap`-based [`Gateway`] and [`RoomDirectory`]
//! - fault injection for the next N writes of either aggregate
//! - a journal of committed writes for write-order assertions

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned lock

use conclave_core::{
    Event, EventId, Gateway, GatewayError, GatewayFuture, Participant, ParticipantId, Room,
    RoomDirectory, RoomId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A write that reached the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteRecord {
    /// `save_event`
    SaveEvent(EventId),
    /// `delete_event`
    DeleteEvent(EventId),
    /// `save_participant`
    SaveParticipant(ParticipantId),
}

impl WriteRecord {
    /// Whether the write targeted the event aggregate
    #[must_use]
    pub const fn is_event_write(&self) -> bool {
        matches!(self, Self::SaveEvent(_) | Self::DeleteEvent(_))
    }
}

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, Event>,
    participants: HashMap<ParticipantId, Participant>,
    rooms: HashMap<RoomId, Room>,
    event_write_faults: VecDeque<GatewayError>,
    participant_write_faults: VecDeque<GatewayError>,
    journal: Vec<WriteRecord>,
}

/// In-memory store of events, participants and rooms.
///
/// Clones share the same underlying data, so a test can keep one handle for
/// inspection and give another to the service under test.
///
/// # Example
///
/// ```
/// use conclave_testing::InMemoryGateway;
/// use conclave_core::{Gateway, GatewayError, Participant, Role};
///
/// # async fn example() {
/// let gateway = InMemoryGateway::new();
/// let ada = Participant::new("Ada", Role::Attendee, false);
///
/// gateway.fail_next_participant_writes(1, GatewayError::Unavailable("blip".into()));
/// assert!(gateway.save_participant(ada.clone()).await.is_err());
/// assert!(gateway.save_participant(ada).await.is_ok());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<State>>,
    latency: Option<Duration>,
}

impl InMemoryGateway {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, widening race windows in concurrency tests.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a room and return its id.
    pub fn add_room(&self, room: Room) -> RoomId {
        let id = room.id;
        self.state.write().unwrap().rooms.insert(id, room);
        id
    }

    /// Store a participant directly, bypassing faults and the journal.
    pub fn insert_participant(&self, participant: Participant) -> ParticipantId {
        let id = participant.id;
        self.state.write().unwrap().participants.insert(id, participant);
        id
    }

    /// Store an event directly, bypassing faults and the journal.
    pub fn insert_event(&self, event: Event) -> EventId {
        let id = event.id;
        self.state.write().unwrap().events.insert(id, event);
        id
    }

    /// Remove a participant directly.
    pub fn remove_participant(&self, id: &ParticipantId) {
        self.state.write().unwrap().participants.remove(id);
    }

    /// Fail the next `count` event writes (save or delete) with `error`.
    pub fn fail_next_event_writes(&self, count: usize, error: GatewayError) {
        let mut state = self.state.write().unwrap();
        state
            .event_write_faults
            .extend(std::iter::repeat_n(error, count));
    }

    /// Fail the next `count` participant writes with `error`.
    pub fn fail_next_participant_writes(&self, count: usize, error: GatewayError) {
        let mut state = self.state.write().unwrap();
        state
            .participant_write_faults
            .extend(std::iter::repeat_n(error, count));
    }

    /// Drop any faults that have not fired yet.
    pub fn clear_faults(&self) {
        let mut state = self.state.write().unwrap();
        state.event_write_faults.clear();
        state.participant_write_faults.clear();
    }

    /// Writes that reached the store, in commit order
    #[must_use]
    pub fn journal(&self) -> Vec<WriteRecord> {
        self.state.read().unwrap().journal.clone()
    }

    /// Forget recorded writes (typically after seeding).
    pub fn clear_journal(&self) {
        self.state.write().unwrap().journal.clear();
    }

    /// Snapshot of one event
    #[must_use]
    pub fn event(&self, id: &EventId) -> Option<Event> {
        self.state.read().unwrap().events.get(id).cloned()
    }

    /// Snapshot of one participant
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.state.read().unwrap().participants.get(id).cloned()
    }

    /// Snapshot of every event
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.state.read().unwrap().events.values().cloned().collect()
    }

    /// Snapshot of every participant
    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        self.state
            .read()
            .unwrap()
            .participants
            .values()
            .cloned()
            .collect()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Gateway for InMemoryGateway {
    fn get_event(&self, id: EventId) -> GatewayFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.pause().await;
            let event = self.event(&id);
            Ok(event)
        })
    }

    fn save_event(&self, event: Event) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.write().unwrap();
            if let Some(error) = state.event_write_faults.pop_front() {
                return Err(error);
            }
            state.journal.push(WriteRecord::SaveEvent(event.id));
            state.events.insert(event.id, event);
            Ok(())
        })
    }

    fn delete_event(&self, id: EventId) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.write().unwrap();
            if let Some(error) = state.event_write_faults.pop_front() {
                return Err(error);
            }
            state.journal.push(WriteRecord::DeleteEvent(id));
            state.events.remove(&id);
            Ok(())
        })
    }

    fn list_events(&self) -> GatewayFuture<'_, Vec<Event>> {
        Box::pin(async move {
            self.pause().await;
            let events = self.events();
            Ok(events)
        })
    }

    fn get_participant(&self, id: ParticipantId) -> GatewayFuture<'_, Option<Participant>> {
        Box::pin(async move {
            self.pause().await;
            let participant = self.participant(&id);
            Ok(participant)
        })
    }

    fn save_participant(&self, participant: Participant) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.write().unwrap();
            if let Some(error) = state.participant_write_faults.pop_front() {
                return Err(error);
            }
            state
                .journal
                .push(WriteRecord::SaveParticipant(participant.id));
            state.participants.insert(participant.id, participant);
            Ok(())
        })
    }
}

impl RoomDirectory for InMemoryGateway {
    fn room(&self, id: RoomId) -> GatewayFuture<'_, Option<Room>> {
        Box::pin(async move {
            let room = self.state.read().unwrap().rooms.get(&id).cloned();
            Ok(room)
        })
    }
}
