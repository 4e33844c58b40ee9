//! # Conclave Core
//!
//! Data model and pure decision logic for conference event enrollment.
//!
//! ## Core Concepts
//!
//! - **Event**: capacity-bounded activity with a roster and a priority waitlist
//! - **Participant**: account with the mirror image of its event memberships
//! - **`CapacityPolicy`**: may this participant be admitted, queued or removed?
//! - **`WaitlistQueue`**: VIP block first, FIFO inside each block
//! - **`MembershipDelta`**: idempotent participant-side change
//! - **Gateway / `RoomDirectory`**: persistence collaborators, injected as traits
//!
//! Nothing in this crate performs I/O. The runtime crate owns serialization
//! per event and the ordering of the two aggregate writes.
//!
//! ## Example
//!
//! ```
//! use conclave_core::{CapacityPolicy, Role, Participant, WaitlistQueue};
//!
//! let regular = Participant::new("Ada", Role::Attendee, false);
//! let vip = Participant::new("Grace", Role::Attendee, true);
//!
//! let mut queue = WaitlistQueue::new();
//! queue.insert(regular.id, regular.is_vip()).unwrap();
//! queue.insert(vip.id, vip.is_vip()).unwrap();
//! assert_eq!(queue.ids(), vec![vip.id, regular.id]);
//!
//! assert!(!CapacityPolicy::can_enroll(None, &vip));
//! ```

pub mod delta;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod types;
pub mod waitlist;

pub use delta::{MembershipChange, MembershipDelta};
pub use error::{EnrollmentError, GatewayError};
pub use gateway::{Gateway, GatewayFuture, RoomDirectory};
pub use policy::CapacityPolicy;
pub use types::{
    Capacity, Event, EventId, EventKind, NewEvent, Participant, ParticipantId, Role, Room, RoomId,
    Roster,
};
pub use waitlist::{WaitlistEntry, WaitlistError, WaitlistQueue};
