//! Persistence collaborators.
//!
//! Events and participants live in a key-value store as two independently
//! addressed aggregates. Writes are full-record upserts; there is no
//! multi-record transaction, which is why the runtime orders and retries them.
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the traits can
//! be shared as `Arc<dyn Gateway>` between services and tasks.

use crate::error::GatewayError;
use crate::types::{Capacity, Event, EventId, Participant, ParticipantId, Room, RoomId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by collaborator methods.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Key-value access to event and participant aggregates.
pub trait Gateway: Send + Sync {
    /// Loads an event; `Ok(None)` if it does not exist.
    fn get_event(&self, id: EventId) -> GatewayFuture<'_, Option<Event>>;

    /// Stores an event, replacing any previous version.
    fn save_event(&self, event: Event) -> GatewayFuture<'_, ()>;

    /// Removes an event. Removing a missing event succeeds.
    fn delete_event(&self, id: EventId) -> GatewayFuture<'_, ()>;

    /// Loads every event.
    fn list_events(&self) -> GatewayFuture<'_, Vec<Event>>;

    /// Loads a participant; `Ok(None)` if it does not exist.
    fn get_participant(&self, id: ParticipantId) -> GatewayFuture<'_, Option<Participant>>;

    /// Stores a participant, replacing any previous version.
    fn save_participant(&self, participant: Participant) -> GatewayFuture<'_, ()>;
}

/// Lookup of rooms hosting events.
pub trait RoomDirectory: Send + Sync {
    /// Loads a room; `Ok(None)` if it does not exist.
    fn room(&self, id: RoomId) -> GatewayFuture<'_, Option<Room>>;

    /// Capacity of a room; `Ok(None)` if it does not exist.
    fn room_capacity(&self, id: RoomId) -> GatewayFuture<'_, Option<Capacity>> {
        Box::pin(async move { Ok(self.room(id).await?.map(|room| room.capacity)) })
    }
}
