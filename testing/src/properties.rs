//! Proptest strategies for enrollment.
//!
//! Operations refer to participants and events by index into fixed pools
//! so that generated sequences hit the same records repeatedly and reach
//! full rosters, long waitlists and promotions.

use proptest::prelude::*;

/// One enrollment request against indexed pools of participants and events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `sign_up(event, participant)`
    SignUp {
        /// Event index
        event: usize,
        /// Participant index
        participant: usize,
    },
    /// `cancel_enrollment(event, participant)`
    Cancel {
        /// Event index
        event: usize,
        /// Participant index
        participant: usize,
    },
    /// `join_waitlist(event, participant)`
    JoinWaitlist {
        /// Event index
        event: usize,
        /// Participant index
        participant: usize,
    },
    /// `leave_waitlist(event, participant)`
    LeaveWaitlist {
        /// Event index
        event: usize,
        /// Participant index
        participant: usize,
    },
    /// `change_capacity(event, capacity)`
    ChangeCapacity {
        /// Event index
        event: usize,
        /// Requested capacity, possibly invalid
        capacity: u32,
    },
    /// `set_vip_only(event, vip_only)`
    SetVipOnly {
        /// Event index
        event: usize,
        /// New restriction
        vip_only: bool,
    },
    /// `cancel_event(event)`
    CancelEvent {
        /// Event index
        event: usize,
    },
    /// Arm store failures for the writes that follow; not a service call
    Fault {
        /// Fail event writes rather than participant writes
        on_event: bool,
        /// Number of consecutive writes that fail
        count: usize,
        /// Whether the failures are worth retrying
        transient: bool,
    },
}

impl Op {
    /// Event index the operation targets, if any
    #[must_use]
    pub const fn event(&self) -> Option<usize> {
        match *self {
            Self::SignUp { event, .. }
            | Self::Cancel { event, .. }
            | Self::JoinWaitlist { event, .. }
            | Self::LeaveWaitlist { event, .. }
            | Self::ChangeCapacity { event, .. }
            | Self::SetVipOnly { event, .. }
            | Self::CancelEvent { event } => Some(event),
            Self::Fault { .. } => None,
        }
    }
}

/// Strategy for a single [`Op`].
///
/// Participant-facing requests dominate; capacity changes range over
/// `0..=max_capacity` so that rejected resizes are generated too.
pub fn op_strategy(
    participants: usize,
    events: usize,
    max_capacity: u32,
) -> impl Strategy<Value = Op> {
    let pair = (0..events, 0..participants);
    prop_oneof![
        4 => pair.clone().prop_map(|(event, participant)| Op::SignUp { event, participant }),
        2 => pair.clone().prop_map(|(event, participant)| Op::Cancel { event, participant }),
        3 => pair.clone().prop_map(|(event, participant)| Op::JoinWaitlist { event, participant }),
        1 => pair.prop_map(|(event, participant)| Op::LeaveWaitlist { event, participant }),
        1 => (0..events, 0..=max_capacity)
            .prop_map(|(event, capacity)| Op::ChangeCapacity { event, capacity }),
        1 => (0..events, any::<bool>())
            .prop_map(|(event, vip_only)| Op::SetVipOnly { event, vip_only }),
    ]
}

/// Strategy for armed store failures: one to three writes of either aggregate.
pub fn fault_strategy() -> impl Strategy<Value = Op> {
    (any::<bool>(), 1..=3usize, any::<bool>())
        .prop_map(|(on_event, count, transient)| Op::Fault { on_event, count, transient })
}

/// Strategy for sequences that also cancel events and interleave store
/// failures with regular requests.
pub fn faulty_ops_strategy(
    participants: usize,
    events: usize,
    max_capacity: u32,
    max_len: usize,
) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        12 => op_strategy(participants, events, max_capacity),
        3 => fault_strategy(),
        1 => (0..events).prop_map(|event| Op::CancelEvent { event }),
    ];
    prop::collection::vec(op, 1..=max_len)
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn ops_strategy(
    participants: usize,
    events: usize,
    max_capacity: u32,
    max_len: usize,
) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(participants, events, max_capacity), 1..=max_len)
}

/// Strategy for a waitlist arrival: a VIP flag per entrant.
pub fn arrivals_strategy(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..=max_len)
}
