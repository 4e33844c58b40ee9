//! # Conclave Testing
//!
//! Testing utilities for conference enrollment.
//!
//! This crate provides:
//! - An in-memory [`Gateway`](conclave_core::Gateway) and
//!   [`RoomDirectory`](conclave_core::RoomDirectory) with fault injection
//! - Builders for events and a fixed conference clock
//! - Invariant assertions over events and participants
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use conclave_testing::{EventBuilder, InMemoryGateway, assert_consistent};
//!
//! #[tokio::test]
//! async fn test_sign_up() {
//!     let gateway = InMemoryGateway::new();
//!     let room = gateway.add_room(Room::new("BA1160", Capacity::new(20)));
//!     let event = gateway.insert_event(EventBuilder::new(room).capacity(2).build_event());
//!     let service = EnrollmentService::new(Arc::new(gateway.clone()), Arc::new(gateway.clone()));
//!
//!     service.sign_up(event, ada).await.unwrap();
//!
//!     assert_consistent(&gateway.events(), &gateway.participants());
//! }
//! ```

/// In-memory gateway with fault injection and a write journal
pub mod gateway_mocks;

/// Test helpers and utilities
pub mod helpers;

/// Property-based testing utilities using proptest.
pub mod properties;

/// Mock implementations of the persistence collaborators.
pub mod mocks {
    pub use crate::gateway_mocks::{InMemoryGateway, WriteRecord};
}

// Re-export commonly used items
pub use gateway_mocks::{InMemoryGateway, WriteRecord};
pub use helpers::{
    EventBuilder, assert_consistent, conference_start, consistency_violations,
};
pub use properties::{
    Op, arrivals_strategy, fault_strategy, faulty_ops_strategy, op_strategy, ops_strategy,
};
