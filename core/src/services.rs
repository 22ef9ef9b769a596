//! Wiring of the release components over one environment.

use crate::config::ReleaseConfig;
use crate::environment::ReleaseEnvironment;
use crate::error::ConfigError;
use crate::reporter::QueueStatusReporter;
use crate::scheduler::{ReleaseOptions, ReleaseScheduler};

/// The scheduler and reporter sharing one environment and configuration.
#[derive(Clone)]
pub struct ReleaseServices {
    /// Batch ticket release
    pub scheduler: ReleaseScheduler,
    /// Read-only dashboards
    pub reporter: QueueStatusReporter,
    /// Configuration the services were built from
    pub config: ReleaseConfig,
}

impl ReleaseServices {
    /// Validate `config` and build the services.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(env: ReleaseEnvironment, config: ReleaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = config.capacity_registry()?;

        let reporter = QueueStatusReporter::new(
            env.clone(),
            registry.clone(),
            config.average_service_duration(),
            config.coverage_threshold,
        );
        let scheduler = ReleaseScheduler::new(env, registry);

        Ok(Self {
            scheduler,
            reporter,
            config,
        })
    }

    /// Default options for a release: the configured deadline, no filter.
    #[must_use]
    pub fn release_options(&self) -> ReleaseOptions {
        match self.config.release_timeout() {
            Some(timeout) => ReleaseOptions::default().with_timeout(timeout),
            None => ReleaseOptions::default(),
        }
    }
}
