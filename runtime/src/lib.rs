//! # Conclave Runtime
//!
//! Runtime for conference enrollment.
//!
//! This crate turns the pure decisions of `conclave-core` into committed
//! state, coordinating concurrent requests and a store that has no
//! multi-record transactions.
//!
//! ## Core Components
//!
//! - **`EnrollmentService`**: the public operations (sign up, waitlist, cancel,
//!   resize, event lifecycle, repair, queries)
//! - **`KeyedLocks`**: one async mutex per event and per participant
//! - **`ConsistencyCoordinator`**: ordered, retried writes of both aggregates
//! - **Retry / Metrics**: backoff for transient store failures and Prometheus
//!   counters for everything above
//!
//! ## Example
//!
//! ```ignore
//! use conclave_runtime::EnrollmentService;
//!
//! let service = EnrollmentService::new(gateway, rooms);
//!
//! service.sign_up(event_id, participant_id).await?;
//! let promoted = service.cancel_enrollment(event_id, participant_id).await?;
//! let roster = service.roster(event_id).await?;
//! ```

/// Ordered writes of event and participant aggregates
pub mod coordinator;

/// Per-key async locks
pub mod locks;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Enrollment operations
pub mod service;

pub use coordinator::{CommitPlan, ConsistencyCoordinator, EventWrite};
pub use locks::{KeyGuard, KeyedLocks};
pub use metrics::{EnrollmentMetrics, MetricsError, MetricsExporter};
pub use retry::{RetryPolicy, RetryPolicyBuilder, retry_with_predicate};
pub use service::EnrollmentService;
