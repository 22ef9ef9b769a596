//! Release engine configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::calendar::OperatingCalendar;
use crate::capacity::CapacityRegistry;
use crate::error::ConfigError;
use crate::reporter::QueueStatusReporter;
use crate::types::Category;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Release engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Comma-separated weekday names the service runs on (default: `tue,wed,thu`)
    pub operating_weekdays: String,
    /// Food tickets per operating day when no capacity row exists
    pub default_limit_food: u32,
    /// General tickets per operating day when no capacity row exists
    pub default_limit_general: u32,
    /// Average minutes spent serving one visitor, for wait estimates
    pub avg_service_minutes: u32,
    /// Staffing ratio below which a date is a coverage gap
    pub coverage_threshold: f64,
    /// Release batch deadline in seconds (0 = no deadline)
    pub release_timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            operating_weekdays: "tue,wed,thu".to_string(),
            default_limit_food: 40,
            default_limit_general: 25,
            avg_service_minutes: 15,
            coverage_threshold: QueueStatusReporter::DEFAULT_COVERAGE_THRESHOLD,
            release_timeout_secs: 30,
        }
    }
}

impl ReleaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable numeric values fall back to the defaults; call
    /// [`ReleaseConfig::validate`] before use.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            operating_weekdays: env::var("RELEASE_OPERATING_WEEKDAYS")
                .unwrap_or(defaults.operating_weekdays),
            default_limit_food: env::var("RELEASE_DEFAULT_LIMIT_FOOD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_limit_food),
            default_limit_general: env::var("RELEASE_DEFAULT_LIMIT_GENERAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_limit_general),
            avg_service_minutes: env::var("RELEASE_AVG_SERVICE_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.avg_service_minutes),
            coverage_threshold: env::var("RELEASE_COVERAGE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.coverage_threshold),
            release_timeout_secs: env::var("RELEASE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.release_timeout_secs),
        }
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weekdays()?.is_empty() {
            return Err(ConfigError::NoOperatingDays);
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(ConfigError::InvalidCoverageThreshold(self.coverage_threshold));
        }
        if self.avg_service_minutes == 0 {
            return Err(ConfigError::ZeroServiceDuration);
        }
        Ok(())
    }

    /// Parsed operating weekdays.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeekday`] for an unknown name.
    pub fn weekdays(&self) -> Result<Vec<Weekday>, ConfigError> {
        self.operating_weekdays
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.parse::<Weekday>()
                    .map_err(|_| ConfigError::InvalidWeekday(name.to_string()))
            })
            .collect()
    }

    /// Operating calendar for the configured weekdays.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeekday`] for an unknown name.
    pub fn calendar(&self) -> Result<OperatingCalendar, ConfigError> {
        Ok(OperatingCalendar::new(self.weekdays()?))
    }

    /// Default per-category limits.
    #[must_use]
    pub fn default_limits(&self) -> HashMap<Category, u32> {
        HashMap::from([
            (Category::Food, self.default_limit_food),
            (Category::General, self.default_limit_general),
        ])
    }

    /// Capacity registry over the configured calendar and defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeekday`] for an unknown name.
    pub fn capacity_registry(&self) -> Result<CapacityRegistry, ConfigError> {
        Ok(CapacityRegistry::new(self.calendar()?, self.default_limits()))
    }

    /// Average service duration for wait estimates.
    #[must_use]
    pub fn average_service_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.avg_service_minutes))
    }

    /// Release deadline, if one is configured.
    #[must_use]
    pub const fn release_timeout(&self) -> Option<Duration> {
        if self.release_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.release_timeout_secs))
        }
    }
}
