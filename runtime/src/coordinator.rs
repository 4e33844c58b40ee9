//! Ordered, retried writes of the event and participant aggregates.
//!
//! Every transition touches two independently stored records. Without a
//! shared transaction the coordinator fixes the order of the writes so that
//! the event record is always the authority on who holds a seat:
//!
//! ```text
//! removal deltas ──► event record ──► addition deltas
//! (unenroll, unwaitlist, forget)      (enroll, waitlist, promote)
//! ```
//!
//! A participant record therefore never claims a membership the event does
//! not list. After a partial failure it can only lag behind the event, which
//! [`EnrollmentService::reconcile`](crate::EnrollmentService::reconcile) or a
//! re-issued request repairs.
//!
//! If the first write fails nothing has been committed and the store error is
//! returned. If a later write fails, it is retried with backoff; once retries
//! are exhausted the operation reports [`EnrollmentError::InconsistentState`].
//! Committed writes are never rolled back.

use crate::locks::KeyedLocks;
use crate::metrics::EnrollmentMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use conclave_core::{
    EnrollmentError, Event, EventId, Gateway, GatewayError, MembershipDelta, ParticipantId,
};
use std::fmt;
use std::sync::Arc;

/// What happens to the event record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventWrite {
    /// Replace the event with this version
    Save(Event),
    /// Remove the event
    Delete(EventId),
}

impl EventWrite {
    /// Event the write targets
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::Save(event) => event.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Everything one transition writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitPlan {
    /// Event side
    pub event: EventWrite,
    /// Participant side; removals are written before the event, additions after
    pub deltas: Vec<MembershipDelta>,
}

impl CommitPlan {
    /// Plan that stores `event` alongside `deltas`.
    #[must_use]
    pub const fn save(event: Event, deltas: Vec<MembershipDelta>) -> Self {
        Self {
            event: EventWrite::Save(event),
            deltas,
        }
    }

    /// Plan that deletes the event alongside `deltas`.
    #[must_use]
    pub const fn delete(event: EventId, deltas: Vec<MembershipDelta>) -> Self {
        Self {
            event: EventWrite::Delete(event),
            deltas,
        }
    }

    /// Deltas that only take memberships away, in plan order
    pub fn removals(&self) -> impl Iterator<Item = &MembershipDelta> {
        self.deltas.iter().filter(|delta| delta.change.is_removal())
    }

    /// Deltas that grant a membership, in plan order
    pub fn additions(&self) -> impl Iterator<Item = &MembershipDelta> {
        self.deltas.iter().filter(|delta| !delta.change.is_removal())
    }
}

/// Why a single aggregate write did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteFailure {
    Store(GatewayError),
    ParticipantMissing(ParticipantId),
}

impl WriteFailure {
    const fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::ParticipantMissing(_) => false,
        }
    }

    // Used when nothing has been committed yet.
    fn into_error(self) -> EnrollmentError {
        match self {
            Self::Store(err) => EnrollmentError::Storage(err),
            Self::ParticipantMissing(id) => EnrollmentError::ParticipantNotFound(id),
        }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::ParticipantMissing(id) => write!(f, "participant {id} no longer exists"),
        }
    }
}

/// Applies [`CommitPlan`]s against the gateway.
pub struct ConsistencyCoordinator {
    gateway: Arc<dyn Gateway>,
    retry: RetryPolicy,
    participant_locks: KeyedLocks<ParticipantId>,
}

impl ConsistencyCoordinator {
    /// Creates a coordinator writing through `gateway`
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            retry,
            participant_locks: KeyedLocks::new(),
        }
    }

    /// Retry policy applied to each write
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Writes both sides of `plan` in its order.
    ///
    /// The caller must hold the event lock for `plan.event`.
    ///
    /// # Errors
    ///
    /// - [`EnrollmentError::Storage`] / [`EnrollmentError::ParticipantNotFound`]
    ///   if the first write fails; nothing was committed
    /// - [`EnrollmentError::InconsistentState`] if a later write fails after retries
    pub async fn commit(&self, plan: CommitPlan) -> Result<(), EnrollmentError> {
        let event_id = plan.event.event_id();
        let mut committed = false;

        for delta in plan.removals() {
            self.write_delta(delta).await.map_err(|failure| {
                Self::failed(committed, event_id, Some(delta.participant), failure)
            })?;
            committed = true;
        }

        self.write_event(&plan.event)
            .await
            .map_err(|failure| Self::failed(committed, event_id, None, failure))?;

        for delta in plan.additions() {
            self.write_delta(delta).await.map_err(|failure| {
                Self::failed(true, event_id, Some(delta.participant), failure)
            })?;
        }

        tracing::debug!(event = %event_id, deltas = plan.deltas.len(), "Commit plan applied");
        Ok(())
    }

    async fn write_event(&self, write: &EventWrite) -> Result<(), WriteFailure> {
        retry_with_predicate(
            &self.retry,
            "event",
            || async move {
                let written = match write {
                    EventWrite::Save(event) => self.gateway.save_event(event.clone()).await,
                    EventWrite::Delete(id) => self.gateway.delete_event(*id).await,
                };
                written.map_err(WriteFailure::Store)
            },
            WriteFailure::is_transient,
        )
        .await
    }

    async fn write_delta(&self, delta: &MembershipDelta) -> Result<(), WriteFailure> {
        retry_with_predicate(
            &self.retry,
            "participant",
            || self.apply_delta(delta),
            WriteFailure::is_transient,
        )
        .await
    }

    // One attempt: read the current participant record, apply the delta and
    // write it back, all under the participant's lock so that deltas from
    // other events are never lost.
    async fn apply_delta(&self, delta: &MembershipDelta) -> Result<(), WriteFailure> {
        let _guard = self.participant_locks.lock(delta.participant).await;

        let Some(mut participant) = self
            .gateway
            .get_participant(delta.participant)
            .await
            .map_err(WriteFailure::Store)?
        else {
            if delta.change.is_removal() {
                tracing::debug!(
                    participant = %delta.participant,
                    event = %delta.event,
                    "Participant gone, nothing to remove"
                );
                return Ok(());
            }
            return Err(WriteFailure::ParticipantMissing(delta.participant));
        };

        if !delta.apply(&mut participant) {
            return Ok(());
        }
        self.gateway
            .save_participant(participant)
            .await
            .map_err(WriteFailure::Store)
    }

    fn failed(
        committed: bool,
        event: EventId,
        participant: Option<ParticipantId>,
        failure: WriteFailure,
    ) -> EnrollmentError {
        if !committed {
            return failure.into_error();
        }
        EnrollmentMetrics::record_inconsistency();
        tracing::error!(
            event = %event,
            participant = ?participant,
            error = %failure,
            "Aggregate write failed after an earlier one committed; records disagree"
        );
        EnrollmentError::InconsistentState {
            event,
            participant,
            reason: failure.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::MembershipChange;

    #[test]
    fn plan_splits_removals_from_additions() {
        let event = EventId::new();
        let (leaving, promoted, forgotten) =
            (ParticipantId::new(), ParticipantId::new(), ParticipantId::new());
        let plan = CommitPlan::delete(
            event,
            vec![
                MembershipDelta::new(leaving, event, MembershipChange::Unenroll),
                MembershipDelta::new(promoted, event, MembershipChange::Promote),
                MembershipDelta::new(forgotten, event, MembershipChange::Forget),
            ],
        );

        let removals: Vec<_> = plan.removals().map(|delta| delta.participant).collect();
        let additions: Vec<_> = plan.additions().map(|delta| delta.participant).collect();
        assert_eq!(removals, vec![leaving, forgotten]);
        assert_eq!(additions, vec![promoted]);
        assert_eq!(plan.event.event_id(), event);
    }
}
