//! Property-based tests: random operation sequences never break the
//! enrollment invariants, and sequences interrupted by store failures
//! converge once the store recovers.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use conclave_core::{
    Capacity, EnrollmentError, EventId, GatewayError, Participant, ParticipantId, Role, Room,
};
use conclave_runtime::{EnrollmentService, RetryPolicy};
use conclave_testing::{
    EventBuilder, InMemoryGateway, Op, consistency_violations, faulty_ops_strategy, ops_strategy,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const PARTICIPANTS: usize = 6;
const EVENTS: usize = 3;
const ROOM_CAPACITY: u32 = 3;

struct World {
    gateway: InMemoryGateway,
    service: EnrollmentService,
    events: Vec<EventId>,
    participants: Vec<ParticipantId>,
}

fn world() -> World {
    world_with(RetryPolicy::no_retry())
}

fn world_with(retry: RetryPolicy) -> World {
    let gateway = InMemoryGateway::new();
    let room = gateway.add_room(Room::new("BA1160", Capacity::new(ROOM_CAPACITY)));
    let events = (0..EVENTS)
        .map(|_| gateway.insert_event(EventBuilder::new(room).capacity(2).build_event()))
        .collect();
    // Every third participant is a VIP
    let participants = (0..PARTICIPANTS)
        .map(|i| {
            gateway.insert_participant(Participant::new(format!("p{i}"), Role::Attendee, i % 3 == 0))
        })
        .collect();
    let service = EnrollmentService::new(Arc::new(gateway.clone()), Arc::new(gateway.clone()))
        .with_retry_policy(retry);
    World {
        gateway,
        service,
        events,
        participants,
    }
}

async fn apply(world: &World, op: &Op) -> Result<(), EnrollmentError> {
    let event = |i: usize| world.events[i];
    let participant = |i: usize| world.participants[i];
    match *op {
        Op::SignUp { event: e, participant: p } => {
            world.service.sign_up(event(e), participant(p)).await
        },
        Op::Cancel { event: e, participant: p } => world
            .service
            .cancel_enrollment(event(e), participant(p))
            .await
            .map(|_| ()),
        Op::JoinWaitlist { event: e, participant: p } => {
            world.service.join_waitlist(event(e), participant(p)).await
        },
        Op::LeaveWaitlist { event: e, participant: p } => {
            world.service.leave_waitlist(event(e), participant(p)).await
        },
        Op::ChangeCapacity { event: e, capacity } => world
            .service
            .change_capacity(event(e), Capacity::new(capacity))
            .await
            .map(|_| ()),
        Op::SetVipOnly { event: e, vip_only } => world.service.set_vip_only(event(e), vip_only).await,
        Op::CancelEvent { event: e } => world.service.cancel_event(event(e)).await.map(|_| ()),
        Op::Fault { on_event, count, transient } => {
            let error = if transient {
                GatewayError::Unavailable("connection reset".to_string())
            } else {
                GatewayError::Backend("disk full".to_string())
            };
            if on_event {
                world.gateway.fail_next_event_writes(count, error);
            } else {
                world.gateway.fail_next_participant_writes(count, error);
            }
            Ok(())
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_invariants_hold_after_every_operation(
        ops in ops_strategy(PARTICIPANTS, EVENTS, ROOM_CAPACITY + 1, 40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let world = world();

        for op in &ops {
            let outcome = runtime.block_on(apply(&world, op));
            if let Err(err) = &outcome {
                prop_assert!(!err.is_fault(), "{op:?} failed with fault {err}");
            }

            let violations =
                consistency_violations(&world.gateway.events(), &world.gateway.participants());
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);

            for snapshot in world.gateway.events() {
                prop_assert!(snapshot.capacity.value() <= ROOM_CAPACITY);
                // A waitlist only exists behind a full roster
                prop_assert!(snapshot.waitlist.is_empty() || !snapshot.has_open_seat());
            }
        }
    }

    #[test]
    fn prop_store_failures_converge_after_recovery(
        ops in faulty_ops_strategy(PARTICIPANTS, EVENTS, ROOM_CAPACITY + 1, 40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        // One retry: a single transient failure is absorbed, two are not
        let world = world_with(
            RetryPolicy::builder()
                .max_retries(1)
                .initial_delay(Duration::ZERO)
                .build(),
        );

        for op in &ops {
            let outcome = runtime.block_on(apply(&world, op));
            if matches!(&outcome, Err(err) if err.is_fault()) {
                world.gateway.clear_faults();
                let reissued = runtime.block_on(apply(&world, op));
                if let Err(err) = &reissued {
                    prop_assert!(!err.is_fault(), "re-issued {op:?} failed with fault {err}");
                }
                if let Some(index) = op.event() {
                    let reconciled = runtime.block_on(world.service.reconcile(world.events[index]));
                    prop_assert!(
                        matches!(reconciled, Ok(_) | Err(EnrollmentError::EventNotFound(_))),
                        "reconcile after {:?}: {:?}",
                        op,
                        reconciled
                    );
                }
            }

            let violations =
                consistency_violations(&world.gateway.events(), &world.gateway.participants());
            prop_assert!(violations.is_empty(), "after {:?} ({:?}): {:?}", op, outcome, violations);
        }
    }

    #[test]
    fn prop_rejected_operations_leave_no_trace(
        ops in ops_strategy(PARTICIPANTS, EVENTS, ROOM_CAPACITY + 1, 30)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let world = world();

        for op in &ops {
            let before_events = world.gateway.events().len();
            world.gateway.clear_journal();
            let outcome = runtime.block_on(apply(&world, op));
            if outcome.is_err() {
                prop_assert!(world.gateway.journal().is_empty(), "{:?} wrote despite rejection", op);
                prop_assert_eq!(world.gateway.events().len(), before_events);
            }
        }
    }
}
