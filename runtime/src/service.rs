//! Enrollment operations.
//!
//! Each mutating operation runs under the lock of its event, so admission
//! decisions for one event are strictly serialized while different events
//! proceed in parallel. Inside the lock an operation:
//!
//! 1. loads the current event (and participant, when eligibility depends on it)
//! 2. asks [`CapacityPolicy`] whether the transition is allowed
//! 3. builds the next event version and the participant deltas
//! 4. hands both to the [`ConsistencyCoordinator`]
//!
//! A rejected request never reaches step 4, so it leaves no trace.
//!
//! ```text
//!               sign_up                    cancel_enrollment
//! NotInvolved ───────────► Enrolled ─────────────────────────► NotInvolved
//!      │                      ▲                                     ▲
//!      │ join_waitlist        │ promotion (cancel / change_capacity) │
//!      ▼                      │                                     │
//!  Waitlisted ────────────────┘                                     │
//!      └──────────────────────── leave_waitlist ────────────────────┘
//! ```

use crate::coordinator::{CommitPlan, ConsistencyCoordinator};
use crate::locks::KeyedLocks;
use crate::metrics::EnrollmentMetrics;
use crate::retry::RetryPolicy;
use conclave_core::{
    Capacity, CapacityPolicy, EnrollmentError, Event, EventId, EventKind, Gateway,
    MembershipChange, MembershipDelta, NewEvent, Participant, ParticipantId, Role, RoomDirectory,
    Roster,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Orchestrates enrollment, waitlisting, promotion and event lifecycle.
pub struct EnrollmentService {
    gateway: Arc<dyn Gateway>,
    rooms: Arc<dyn RoomDirectory>,
    coordinator: ConsistencyCoordinator,
    event_locks: KeyedLocks<EventId>,
    /// Serializes room and speaker bookings, which span events
    schedule_lock: Mutex<()>,
}

impl EnrollmentService {
    /// Creates a service with the default retry policy.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, rooms: Arc<dyn RoomDirectory>) -> Self {
        Self {
            coordinator: ConsistencyCoordinator::new(Arc::clone(&gateway), RetryPolicy::default()),
            gateway,
            rooms,
            event_locks: KeyedLocks::new(),
            schedule_lock: Mutex::new(()),
        }
    }

    /// Replaces the retry policy used for aggregate writes.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.coordinator = ConsistencyCoordinator::new(Arc::clone(&self.gateway), policy);
        self
    }

    // ========================================================================
    // Participant transitions
    // ========================================================================

    /// Adds `participant_id` to the roster of `event_id`.
    ///
    /// Re-issuing a request whose participant write failed earlier completes
    /// that write instead of reporting [`EnrollmentError::AlreadyEnrolled`].
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::ParticipantNotFound`],
    /// any rejection of [`CapacityPolicy::check_enroll`], or a store fault.
    #[tracing::instrument(skip(self), name = "sign_up")]
    pub async fn sign_up(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<(), EnrollmentError> {
        let started = Instant::now();
        let result: Result<(), EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            let participant = self.load_participant(participant_id).await?;
            if event.is_signed_up(&participant_id) {
                // An earlier sign-up or promotion saved the roster but not the participant.
                let delta = MembershipDelta::syncing(participant_id, &event);
                if !delta.is_reflected_in(&participant) {
                    self.coordinator
                        .commit(CommitPlan::save(event, vec![delta]))
                        .await?;
                    tracing::info!(event = %event_id, participant = %participant_id, "Pending enrollment completed");
                    return Ok(());
                }
            }
            CapacityPolicy::check_enroll(&event, &participant)?;

            let mut next = event;
            next.signed_up.push(participant_id);
            let delta = MembershipDelta::new(participant_id, event_id, MembershipChange::Enroll);
            self.coordinator
                .commit(CommitPlan::save(next, vec![delta]))
                .await?;

            tracing::info!(event = %event_id, participant = %participant_id, "Participant enrolled");
            Ok(())
        }
        .await;
        observe("sign_up", started, result)
    }

    /// Removes `participant_id` from the roster and promotes from the waitlist.
    ///
    /// Returns the participants moved onto the roster, so they can be notified.
    /// While the invariants hold that is at most one.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::NotEnrolled`], or a store fault.
    #[tracing::instrument(skip(self), name = "cancel_enrollment")]
    pub async fn cancel_enrollment(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<Vec<ParticipantId>, EnrollmentError> {
        let started = Instant::now();
        let result: Result<Vec<ParticipantId>, EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            CapacityPolicy::check_cancel(&event, &participant_id)?;

            let mut next = event;
            next.signed_up.retain(|enrolled| *enrolled != participant_id);
            let promoted = promote_while_open(&mut next)?;

            let mut deltas = vec![MembershipDelta::new(
                participant_id,
                event_id,
                MembershipChange::Unenroll,
            )];
            deltas.extend(
                promoted
                    .iter()
                    .map(|id| MembershipDelta::new(*id, event_id, MembershipChange::Promote)),
            );
            self.coordinator
                .commit(CommitPlan::save(next, deltas))
                .await?;

            EnrollmentMetrics::record_promotions(promoted.len());
            tracing::info!(
                event = %event_id,
                participant = %participant_id,
                promoted = promoted.len(),
                "Enrollment cancelled"
            );
            Ok(promoted)
        }
        .await;
        observe("cancel_enrollment", started, result)
    }

    /// Queues `participant_id` on the waitlist of a full event.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::ParticipantNotFound`],
    /// any rejection of [`CapacityPolicy::check_join_waitlist`], or a store fault.
    #[tracing::instrument(skip(self), name = "join_waitlist")]
    pub async fn join_waitlist(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<(), EnrollmentError> {
        let started = Instant::now();
        let result: Result<(), EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            let participant = self.load_participant(participant_id).await?;
            if event.is_waitlisted(&participant_id) {
                let delta = MembershipDelta::syncing(participant_id, &event);
                if !delta.is_reflected_in(&participant) {
                    self.coordinator
                        .commit(CommitPlan::save(event, vec![delta]))
                        .await?;
                    tracing::info!(event = %event_id, participant = %participant_id, "Pending waitlisting completed");
                    return Ok(());
                }
            }
            CapacityPolicy::check_join_waitlist(&event, &participant)?;

            let mut next = event;
            next.waitlist
                .insert(participant_id, participant.is_vip())
                .map_err(|err| err.at(event_id))?;
            let delta = MembershipDelta::new(participant_id, event_id, MembershipChange::Waitlist);
            self.coordinator
                .commit(CommitPlan::save(next, vec![delta]))
                .await?;

            tracing::info!(
                event = %event_id,
                participant = %participant_id,
                vip = participant.is_vip(),
                "Participant waitlisted"
            );
            Ok(())
        }
        .await;
        observe("join_waitlist", started, result)
    }

    /// Removes `participant_id` from the waitlist.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::NotWaitlisted`], or a store fault.
    #[tracing::instrument(skip(self), name = "leave_waitlist")]
    pub async fn leave_waitlist(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<(), EnrollmentError> {
        let started = Instant::now();
        let result: Result<(), EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            CapacityPolicy::check_leave_waitlist(&event, &participant_id)?;

            let mut next = event;
            next.waitlist
                .remove(&participant_id)
                .map_err(|err| err.at(event_id))?;
            let delta =
                MembershipDelta::new(participant_id, event_id, MembershipChange::Unwaitlist);
            self.coordinator
                .commit(CommitPlan::save(next, vec![delta]))
                .await?;

            tracing::info!(event = %event_id, participant = %participant_id, "Left waitlist");
            Ok(())
        }
        .await;
        observe("leave_waitlist", started, result)
    }

    // ========================================================================
    // Event lifecycle
    // ========================================================================

    /// Resizes an event and promotes waiting participants into new seats.
    ///
    /// Returns the promoted participants in promotion order.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::RoomNotFound`],
    /// any rejection of [`CapacityPolicy::check_capacity_change`], or a store fault.
    #[tracing::instrument(skip(self), name = "change_capacity")]
    pub async fn change_capacity(
        &self,
        event_id: EventId,
        new_capacity: Capacity,
    ) -> Result<Vec<ParticipantId>, EnrollmentError> {
        let started = Instant::now();
        let result: Result<Vec<ParticipantId>, EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            let room_capacity = self
                .rooms
                .room_capacity(event.room_id)
                .await?
                .ok_or(EnrollmentError::RoomNotFound(event.room_id))?;

            if let Err(rejection) =
                CapacityPolicy::check_capacity_change(&event, new_capacity, room_capacity)
            {
                tracing::warn!(
                    event = %event_id,
                    requested = %new_capacity,
                    error = %rejection,
                    "Capacity change rejected"
                );
                return Err(rejection);
            }

            let mut next = event.clone();
            next.capacity = new_capacity;
            let promoted = promote_while_open(&mut next)?;
            if next == event {
                return Ok(promoted);
            }

            let deltas = promoted
                .iter()
                .map(|id| MembershipDelta::new(*id, event_id, MembershipChange::Promote))
                .collect();
            self.coordinator
                .commit(CommitPlan::save(next, deltas))
                .await?;

            EnrollmentMetrics::record_promotions(promoted.len());
            tracing::info!(
                event = %event_id,
                from = %event.capacity,
                to = %new_capacity,
                promoted = promoted.len(),
                "Capacity changed"
            );
            Ok(promoted)
        }
        .await;
        observe("change_capacity", started, result)
    }

    /// Deletes an event and removes it from every participant that was
    /// enrolled or waiting.
    ///
    /// Returns the affected participants.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`] or a store fault.
    #[tracing::instrument(skip(self), name = "cancel_event")]
    pub async fn cancel_event(&self, event_id: EventId) -> Result<Vec<ParticipantId>, EnrollmentError> {
        let started = Instant::now();
        let result: Result<Vec<ParticipantId>, EnrollmentError> = async {
            let guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;

            let mut affected = event.signed_up.clone();
            affected.extend(event.waitlist.ids());
            let deltas = affected
                .iter()
                .map(|id| MembershipDelta::new(*id, event_id, MembershipChange::Forget))
                .collect();
            self.coordinator
                .commit(CommitPlan::delete(event_id, deltas))
                .await?;

            self.event_locks.forget(&event_id).await;
            drop(guard);
            tracing::info!(event = %event_id, affected = affected.len(), "Event cancelled");
            Ok(affected)
        }
        .await;
        observe("cancel_event", started, result)
    }

    /// Brings the record of everyone the event lists back in line with it.
    ///
    /// Participant records can only lag behind their event after an
    /// [`EnrollmentError::InconsistentState`]: a pending addition is completed
    /// and a half-done removal is undone. Returns the participants whose
    /// records were rewritten.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`] or a store fault.
    #[tracing::instrument(skip(self), name = "reconcile")]
    pub async fn reconcile(&self, event_id: EventId) -> Result<Vec<ParticipantId>, EnrollmentError> {
        let started = Instant::now();
        let result: Result<Vec<ParticipantId>, EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;

            let mut deltas = Vec::new();
            for member in event.signed_up.iter().copied().chain(event.waitlist.ids()) {
                let Some(participant) = self.gateway.get_participant(member).await? else {
                    tracing::warn!(event = %event_id, participant = %member, "Listed participant has no record");
                    continue;
                };
                let delta = MembershipDelta::syncing(member, &event);
                if !delta.is_reflected_in(&participant) {
                    deltas.push(delta);
                }
            }
            if deltas.is_empty() {
                return Ok(Vec::new());
            }

            let repaired: Vec<ParticipantId> = deltas.iter().map(|delta| delta.participant).collect();
            self.coordinator
                .commit(CommitPlan::save(event, deltas))
                .await?;

            tracing::info!(event = %event_id, repaired = repaired.len(), "Participant records reconciled");
            Ok(repaired)
        }
        .await;
        observe("reconcile", started, result)
    }

    /// Schedules a new event.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::RoomNotFound`], [`EnrollmentError::ParticipantNotFound`] /
    /// [`EnrollmentError::NotASpeaker`] for listed speakers, any rejection of
    /// [`CapacityPolicy::check_new_event`], or a store fault.
    #[tracing::instrument(skip(self, spec), fields(title = %spec.title), name = "create_event")]
    pub async fn create_event(&self, spec: NewEvent) -> Result<EventId, EnrollmentError> {
        let started = Instant::now();
        let result: Result<EventId, EnrollmentError> = async {
            let _schedule = self.schedule_lock.lock().await;
            let room = self
                .rooms
                .room(spec.room_id)
                .await?
                .ok_or(EnrollmentError::RoomNotFound(spec.room_id))?;
            for speaker_id in spec.kind.speakers() {
                let speaker = self.load_participant(*speaker_id).await?;
                if speaker.role != Role::Speaker {
                    return Err(EnrollmentError::NotASpeaker(speaker.id));
                }
            }
            let existing = self.gateway.list_events().await?;
            CapacityPolicy::check_new_event(&spec, &room, &existing)?;

            let event = Event::new(spec);
            let event_id = event.id;
            self.coordinator
                .commit(CommitPlan::save(event, Vec::new()))
                .await?;

            tracing::info!(event = %event_id, room = %room.number, "Event created");
            Ok(event_id)
        }
        .await;
        observe("create_event", started, result)
    }

    /// Assigns a speaker: fills the slot of a one-speaker event or joins the
    /// panel of a multi-speaker event.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`], [`EnrollmentError::ParticipantNotFound`],
    /// any rejection of [`CapacityPolicy::check_speaker_assignment`], or a store fault.
    #[tracing::instrument(skip(self), name = "assign_speaker")]
    pub async fn assign_speaker(
        &self,
        event_id: EventId,
        speaker_id: ParticipantId,
    ) -> Result<(), EnrollmentError> {
        let started = Instant::now();
        let result: Result<(), EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let _schedule = self.schedule_lock.lock().await;
            let event = self.load_event(event_id).await?;
            let speaker = self.load_participant(speaker_id).await?;
            let others = self.gateway.list_events().await?;
            CapacityPolicy::check_speaker_assignment(&event, &speaker, &others)?;

            let mut next = event.clone();
            match &mut next.kind {
                EventKind::OneSpeaker(slot) => *slot = Some(speaker_id),
                EventKind::MultiSpeaker(panel) => {
                    if !panel.contains(&speaker_id) {
                        panel.push(speaker_id);
                    }
                },
                EventKind::NoSpeaker => {
                    return Err(EnrollmentError::NoSpeakerSlots { event: event_id });
                },
            }
            if next == event {
                return Ok(());
            }
            self.coordinator
                .commit(CommitPlan::save(next, Vec::new()))
                .await?;

            tracing::info!(event = %event_id, speaker = %speaker_id, "Speaker assigned");
            Ok(())
        }
        .await;
        observe("assign_speaker", started, result)
    }

    /// Restricts an event to VIP participants, or lifts the restriction.
    ///
    /// Participants already enrolled or waiting keep their place.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`] or a store fault.
    #[tracing::instrument(skip(self), name = "set_vip_only")]
    pub async fn set_vip_only(&self, event_id: EventId, vip_only: bool) -> Result<(), EnrollmentError> {
        let started = Instant::now();
        let result: Result<(), EnrollmentError> = async {
            let _guard = self.event_locks.lock(event_id).await;
            let event = self.load_event(event_id).await?;
            if event.vip_only == vip_only {
                return Ok(());
            }

            let mut next = event;
            next.vip_only = vip_only;
            self.coordinator
                .commit(CommitPlan::save(next, Vec::new()))
                .await?;

            tracing::info!(event = %event_id, vip_only, "VIP restriction changed");
            Ok(())
        }
        .await;
        observe("set_vip_only", started, result)
    }

    /// Creates a participant record with no memberships.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollmentError::Storage`] if the record cannot be written.
    pub async fn register_participant(
        &self,
        name: impl Into<String>,
        role: Role,
        vip: bool,
    ) -> Result<ParticipantId, EnrollmentError> {
        let participant = Participant::new(name, role, vip);
        let participant_id = participant.id;
        self.gateway.save_participant(participant).await?;
        tracing::debug!(participant = %participant_id, ?role, vip, "Participant registered");
        Ok(participant_id)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current version of an event.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`] or a store fault.
    pub async fn event(&self, event_id: EventId) -> Result<Event, EnrollmentError> {
        self.load_event(event_id).await
    }

    /// Current version of a participant.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::ParticipantNotFound`] or a store fault.
    pub async fn participant(&self, participant_id: ParticipantId) -> Result<Participant, EnrollmentError> {
        self.load_participant(participant_id).await
    }

    /// Enrolled and waiting participants of an event.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::EventNotFound`] or a store fault.
    pub async fn roster(&self, event_id: EventId) -> Result<Roster, EnrollmentError> {
        Ok(self.load_event(event_id).await?.roster())
    }

    /// Events the participant is enrolled in.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::ParticipantNotFound`] or a store fault.
    pub async fn enrolled_events(&self, participant_id: ParticipantId) -> Result<Vec<EventId>, EnrollmentError> {
        let participant = self.load_participant(participant_id).await?;
        Ok(participant.enrolled_events.into_iter().collect())
    }

    /// Events the participant is waiting on.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::ParticipantNotFound`] or a store fault.
    pub async fn waitlisted_events(&self, participant_id: ParticipantId) -> Result<Vec<EventId>, EnrollmentError> {
        let participant = self.load_participant(participant_id).await?;
        Ok(participant.waitlisted_events.into_iter().collect())
    }

    /// Events the participant could sign up for right now, earliest first.
    ///
    /// # Errors
    ///
    /// [`EnrollmentError::ParticipantNotFound`] or a store fault.
    pub async fn events_open_to(&self, participant_id: ParticipantId) -> Result<Vec<Event>, EnrollmentError> {
        let participant = self.load_participant(participant_id).await?;
        let mut open: Vec<Event> = self
            .gateway
            .list_events()
            .await?
            .into_iter()
            .filter(|event| CapacityPolicy::can_enroll(Some(event), &participant))
            .collect();
        open.sort_by_key(|event| event.starts_at);
        Ok(open)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    async fn load_event(&self, event_id: EventId) -> Result<Event, EnrollmentError> {
        self.gateway
            .get_event(event_id)
            .await?
            .ok_or(EnrollmentError::EventNotFound(event_id))
    }

    async fn load_participant(&self, participant_id: ParticipantId) -> Result<Participant, EnrollmentError> {
        self.gateway
            .get_participant(participant_id)
            .await?
            .ok_or(EnrollmentError::ParticipantNotFound(participant_id))
    }
}

/// Moves waiting participants onto the roster while seats are free.
fn promote_while_open(event: &mut Event) -> Result<Vec<ParticipantId>, EnrollmentError> {
    let mut promoted = Vec::new();
    while event.has_open_seat() && !event.waitlist.is_empty() {
        let next = event
            .waitlist
            .promote_front()
            .map_err(|err| err.at(event.id))?;
        event.signed_up.push(next);
        promoted.push(next);
    }
    Ok(promoted)
}

/// Records metrics for a finished operation and passes the result through.
fn observe<T>(
    operation: &'static str,
    started: Instant,
    result: Result<T, EnrollmentError>,
) -> Result<T, EnrollmentError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => {
            if !err.is_fault() {
                tracing::debug!(operation, reason = err.kind(), "Request rejected");
            }
            err.kind()
        },
    };
    EnrollmentMetrics::record_operation(operation, outcome, started.elapsed());
    result
}
