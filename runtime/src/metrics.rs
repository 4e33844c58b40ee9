//! Prometheus metrics for enrollment.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, so library users and tests pay nothing unless the
//! application opts in with [`MetricsExporter::install`].
//!
//! # Example
//!
//! ```rust,no_run
//! use conclave_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... serve requests ...
//!
//! if let Some(scrape) = exporter.render() {
//!     println!("{scrape}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder with text rendering.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A second installation in the same process (common in tests) is logged
    /// and ignored.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the exporter hasn't been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "enrollment_operations_total",
        "Enrollment operations by operation and outcome"
    );
    describe_histogram!(
        "enrollment_operation_duration_seconds",
        "Time taken by enrollment operations, including lock wait"
    );
    describe_counter!(
        "enrollment_promotions_total",
        "Participants promoted from a waitlist to a roster"
    );
    describe_counter!(
        "enrollment_write_retries_total",
        "Aggregate writes retried after a transient store failure"
    );
    describe_counter!(
        "enrollment_inconsistent_state_total",
        "Operations that committed one aggregate but not the other"
    );
}

/// Enrollment metrics recorder.
pub struct EnrollmentMetrics;

impl EnrollmentMetrics {
    /// Record the outcome of one service operation.
    ///
    /// `outcome` is `"ok"` or an [`EnrollmentError::kind`](conclave_core::EnrollmentError::kind) label.
    pub fn record_operation(operation: &'static str, outcome: &'static str, duration: Duration) {
        counter!("enrollment_operations_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        histogram!("enrollment_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    /// Record waitlist promotions.
    pub fn record_promotions(count: usize) {
        if count > 0 {
            counter!("enrollment_promotions_total").increment(count as u64);
        }
    }

    /// Record a retried aggregate write.
    pub fn record_write_retry(target: &'static str) {
        counter!("enrollment_write_retries_total", "target" => target).increment(1);
    }

    /// Record an interrupted two-write sequence.
    pub fn record_inconsistency() {
        counter!("enrollment_inconsistent_state_total").increment(1);
    }
}
