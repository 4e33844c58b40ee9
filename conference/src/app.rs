//! Application wiring: store, service and metrics.

use crate::config::Config;
use crate::seed::{Seed, SeedError, SeededIds};
use conclave_runtime::{EnrollmentService, MetricsError, MetricsExporter};
use conclave_testing::InMemoryGateway;
use std::sync::Arc;
use thiserror::Error;

/// Errors from building or seeding the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Metrics recorder could not be installed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Seed could not be loaded or applied
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// A running conference: one in-memory store shared by the enrollment
/// service and the rooms directory.
///
/// There is no persistent backend; the demo runs on the same
/// [`InMemoryGateway`] the test suites use, with no faults armed.
pub struct ConferenceApp {
    /// Backing store, also the rooms directory
    pub gateway: InMemoryGateway,
    /// Enrollment operations
    pub service: Arc<EnrollmentService>,
    metrics: MetricsExporter,
}

impl ConferenceApp {
    /// Build the application from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Metrics`] if metrics are enabled and the recorder
    /// cannot be installed.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let mut metrics = MetricsExporter::new();
        if config.metrics_enabled {
            metrics.install()?;
        }

        let gateway = InMemoryGateway::new();
        let service = EnrollmentService::new(Arc::new(gateway.clone()), Arc::new(gateway.clone()))
            .with_retry_policy(config.retry.policy());

        tracing::info!(
            max_retries = config.retry.max_retries,
            metrics = config.metrics_enabled,
            "Conference application initialized"
        );
        Ok(Self {
            gateway,
            service: Arc::new(service),
            metrics,
        })
    }

    /// Apply a seed document.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Seed`] if the seed references unknown records or a
    /// record is rejected by the service.
    pub async fn seed(&self, seed: &Seed) -> Result<SeededIds, AppError> {
        Ok(seed.apply(&self.gateway, &self.service).await?)
    }

    /// Current metrics in Prometheus text format, if metrics are enabled.
    #[must_use]
    pub fn metrics_scrape(&self) -> Option<String> {
        self.metrics.render()
    }
}
