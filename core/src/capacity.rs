//! Capacity registry.
//!
//! Single source of truth for "how many tickets may be issued for this slot".
//! Resolution is total and never fails:
//!
//! 1. not an operating day → `0`
//! 2. a capacity row exists → its value for the category (`0` if absent)
//! 3. otherwise → the configured default for the category

use crate::calendar::{DayResolution, OperatingCalendar};
use crate::environment::CapacityStore;
use crate::error::{ConfigurationError, StoreError};
use crate::metrics;
use crate::types::Category;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Resolves slot capacity from the calendar, override rows and defaults.
#[derive(Debug, Clone)]
pub struct CapacityRegistry {
    calendar: OperatingCalendar,
    defaults: HashMap<Category, u32>,
}

impl CapacityRegistry {
    /// Create a registry with per-category default limits.
    #[must_use]
    pub const fn new(calendar: OperatingCalendar, defaults: HashMap<Category, u32>) -> Self {
        Self { calendar, defaults }
    }

    /// The operating calendar consulted in step 1.
    #[must_use]
    pub const fn calendar(&self) -> &OperatingCalendar {
        &self.calendar
    }

    /// Default limit for a category when no row is configured.
    #[must_use]
    pub fn default_limit(&self, category: Category) -> u32 {
        self.defaults.get(&category).copied().unwrap_or(0)
    }

    /// Load and resolve the day.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the capacity row cannot be loaded.
    pub async fn resolve_day(
        &self,
        store: &dyn CapacityStore,
        date: NaiveDate,
    ) -> Result<DayResolution, StoreError> {
        let row = store.get_capacity_day(date).await?;
        Ok(self.calendar.resolve(date, row))
    }

    /// Limit for one category of an already resolved day.
    #[must_use]
    pub fn resolve_limit(&self, day: &DayResolution, category: Category) -> u32 {
        if !day.is_operating_day {
            return 0;
        }

        let Some(row) = &day.capacity_day else {
            return self.default_limit(category);
        };

        let configured = row.max_by_category.get(&category).copied().unwrap_or(0);
        u32::try_from(configured).unwrap_or_else(|_| {
            let error = ConfigurationError::NegativeLimit {
                date: day.date,
                category,
                value: configured,
            };
            tracing::warn!(%error, "Clamping capacity to zero");
            metrics::record_configuration_error(category);
            0
        })
    }

    /// Capacity for `(date, category)`.
    ///
    /// Total: a storage failure is logged and yields `0`, so a broken
    /// configuration store means "no releases", never a crash.
    pub async fn limit_for(
        &self,
        store: &dyn CapacityStore,
        date: NaiveDate,
        category: Category,
    ) -> u32 {
        match self.resolve_day(store, date).await {
            Ok(day) => self.resolve_limit(&day, category),
            Err(error) => {
                tracing::error!(%date, %category, %error, "Capacity lookup failed, limit is 0");
                0
            }
        }
    }

    /// Capacity for several categories with a single row load.
    pub async fn limits_for(
        &self,
        store: &dyn CapacityStore,
        date: NaiveDate,
        categories: &[Category],
    ) -> Vec<(Category, u32)> {
        match self.resolve_day(store, date).await {
            Ok(day) => categories
                .iter()
                .map(|category| (*category, self.resolve_limit(&day, *category)))
                .collect(),
            Err(error) => {
                tracing::error!(%date, %error, "Capacity lookup failed, limits are 0");
                categories.iter().map(|category| (*category, 0)).collect()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::environment::BoxFuture;
    use crate::types::CapacityDay;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct OneRow(Option<CapacityDay>);

    impl CapacityStore for OneRow {
        fn get_capacity_day(
            &self,
            _date: NaiveDate,
        ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
            let row = self.0.clone();
            Box::pin(async move { Ok(row) })
        }
    }

    struct Broken;

    impl CapacityStore for Broken {
        fn get_capacity_day(
            &self,
            _date: NaiveDate,
        ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
            Box::pin(async { Err(StoreError::Database("timeout".to_string())) })
        }
    }

    fn registry() -> CapacityRegistry {
        CapacityRegistry::new(
            OperatingCalendar::default(),
            HashMap::from([(Category::Food, 40), (Category::General, 25)]),
        )
    }

    #[test]
    fn test_defaults_apply_without_row() {
        let wednesday = date(2025, 1, 8);
        let limit = tokio_test::block_on(registry().limit_for(&OneRow(None), wednesday, Category::Food));
        assert_eq!(limit, 40);
    }

    #[test]
    fn test_row_overrides_defaults_and_missing_category_is_zero() {
        let wednesday = date(2025, 1, 8);
        let store = OneRow(Some(CapacityDay::new(wednesday, true, false).with_limit(Category::Food, 2)));
        let limits = tokio_test::block_on(registry().limits_for(
            &store,
            wednesday,
            &[Category::Food, Category::General],
        ));
        assert_eq!(limits, vec![(Category::Food, 2), (Category::General, 0)]);
    }

    #[test]
    fn test_sunday_is_zero_regardless_of_row() {
        let sunday = date(2025, 1, 5);
        let store = OneRow(Some(CapacityDay::new(sunday, true, false).with_limit(Category::Food, 9)));
        let limit = tokio_test::block_on(registry().limit_for(&store, sunday, Category::Food));
        assert_eq!(limit, 0);
    }

    #[test]
    fn test_override_opens_sunday_with_row_limits() {
        let sunday = date(2025, 1, 5);
        let store = OneRow(Some(CapacityDay::new(sunday, true, true).with_limit(Category::Food, 9)));
        let limit = tokio_test::block_on(registry().limit_for(&store, sunday, Category::Food));
        assert_eq!(limit, 9);
    }

    #[test]
    fn test_negative_limit_is_clamped() {
        let wednesday = date(2025, 1, 8);
        let store = OneRow(Some(
            CapacityDay::new(wednesday, true, false).with_limit(Category::General, -3),
        ));
        let limit = tokio_test::block_on(registry().limit_for(&store, wednesday, Category::General));
        assert_eq!(limit, 0);
    }

    #[test]
    fn test_store_failure_yields_zero() {
        let wednesday = date(2025, 1, 8);
        let limit = tokio_test::block_on(registry().limit_for(&Broken, wednesday, Category::Food));
        assert_eq!(limit, 0);
    }
}
