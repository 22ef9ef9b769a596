//! Operating calendar.
//!
//! A date is an operating day when its weekday is in the configured set
//! (Tuesday to Thursday by default) unless an administrator override row for
//! that date says otherwise.

use crate::environment::CapacityStore;
use crate::types::CapacityDay;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;

/// How far ahead [`OperatingCalendar::next_operating_day`] looks.
pub const LOOKAHEAD_DAYS: u64 = 60;

/// Where an operating-day decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySource {
    /// The default weekday rule
    WeekdayRule,
    /// An administrator override row
    Override,
}

/// Everything known about one date: its operating status and capacity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayResolution {
    /// The resolved date
    pub date: NaiveDate,
    /// Whether visits happen
    pub is_operating_day: bool,
    /// Which rule decided
    pub source: DaySource,
    /// Capacity row for the date, if configured
    pub capacity_day: Option<CapacityDay>,
}

/// Fixed weekday rule plus per-date overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingCalendar {
    weekdays: [bool; 7],
}

impl OperatingCalendar {
    /// Calendar open on the given weekdays.
    #[must_use]
    pub fn new(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut open = [false; 7];
        for day in weekdays {
            open[day.num_days_from_monday() as usize] = true;
        }
        Self { weekdays: open }
    }

    /// Weekdays the service runs on by default.
    #[must_use]
    pub fn default_weekdays() -> Vec<Weekday> {
        vec![Weekday::Tue, Weekday::Wed, Weekday::Thu]
    }

    /// Configured weekdays, Monday first.
    #[must_use]
    pub fn weekdays(&self) -> Vec<Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|day| self.weekdays[day.num_days_from_monday() as usize])
        .collect()
    }

    /// Weekday rule alone, ignoring overrides.
    #[must_use]
    pub fn is_default_operating_day(&self, date: NaiveDate) -> bool {
        self.weekdays[date.weekday().num_days_from_monday() as usize]
    }

    /// Decide a date given its (optional) capacity row.
    ///
    /// Only rows flagged `is_override` change the operating status; a plain
    /// row still contributes its category limits.
    #[must_use]
    pub fn resolve(&self, date: NaiveDate, capacity_day: Option<CapacityDay>) -> DayResolution {
        let (is_operating_day, source) = match &capacity_day {
            Some(day) if day.is_override => (day.is_operating_day, DaySource::Override),
            _ => (self.is_default_operating_day(date), DaySource::WeekdayRule),
        };

        DayResolution {
            date,
            is_operating_day,
            source,
            capacity_day,
        }
    }

    /// Load the override row for `date` and resolve it.
    ///
    /// A failed lookup degrades to the weekday rule.
    pub async fn is_operating_day(&self, store: &dyn CapacityStore, date: NaiveDate) -> bool {
        match store.get_capacity_day(date).await {
            Ok(row) => self.resolve(date, row).is_operating_day,
            Err(error) => {
                tracing::warn!(
                    %date,
                    %error,
                    "Capacity lookup failed, falling back to weekday rule"
                );
                self.is_default_operating_day(date)
            }
        }
    }

    /// First operating day strictly after `after`, within [`LOOKAHEAD_DAYS`].
    pub async fn next_operating_day(
        &self,
        store: &dyn CapacityStore,
        after: NaiveDate,
    ) -> Option<NaiveDate> {
        for offset in 1..=LOOKAHEAD_DAYS {
            let date = after.checked_add_days(Days::new(offset))?;
            if self.is_operating_day(store, date).await {
                return Some(date);
            }
        }
        None
    }
}

impl Default for OperatingCalendar {
    fn default() -> Self {
        Self::new(Self::default_weekdays())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::environment::BoxFuture;
    use crate::error::StoreError;
    use std::collections::HashMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Rows(HashMap<NaiveDate, CapacityDay>);

    impl CapacityStore for Rows {
        fn get_capacity_day(
            &self,
            date: NaiveDate,
        ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
            let row = self.0.get(&date).cloned();
            Box::pin(async move { Ok(row) })
        }
    }

    struct Broken;

    impl CapacityStore for Broken {
        fn get_capacity_day(
            &self,
            _date: NaiveDate,
        ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
            Box::pin(async { Err(StoreError::Database("down".to_string())) })
        }
    }

    #[test]
    fn test_default_rule_is_tuesday_to_thursday() {
        let calendar = OperatingCalendar::default();
        // 2025-01-06 is a Monday
        let open: Vec<bool> = (6..=12)
            .map(|d| calendar.is_default_operating_day(date(2025, 1, d)))
            .collect();
        assert_eq!(open, vec![false, true, true, true, false, false, false]);
        assert_eq!(
            calendar.weekdays(),
            vec![Weekday::Tue, Weekday::Wed, Weekday::Thu]
        );
    }

    #[test]
    fn test_override_opens_sunday() {
        let calendar = OperatingCalendar::default();
        let sunday = date(2025, 1, 5);
        let row = CapacityDay::new(sunday, true, true);

        let resolution = calendar.resolve(sunday, Some(row));
        assert!(resolution.is_operating_day);
        assert_eq!(resolution.source, DaySource::Override);
    }

    #[test]
    fn test_override_closes_tuesday() {
        let calendar = OperatingCalendar::default();
        let tuesday = date(2025, 1, 7);
        let resolution = calendar.resolve(tuesday, Some(CapacityDay::new(tuesday, false, true)));
        assert!(!resolution.is_operating_day);
    }

    #[test]
    fn test_non_override_row_does_not_change_status() {
        let calendar = OperatingCalendar::default();
        let sunday = date(2025, 1, 5);
        let resolution = calendar.resolve(sunday, Some(CapacityDay::new(sunday, true, false)));
        assert!(!resolution.is_operating_day);
        assert_eq!(resolution.source, DaySource::WeekdayRule);
        assert!(resolution.capacity_day.is_some());
    }

    #[tokio::test]
    async fn test_lookup_failure_uses_weekday_rule() {
        let calendar = OperatingCalendar::default();
        assert!(calendar.is_operating_day(&Broken, date(2025, 1, 8)).await);
        assert!(!calendar.is_operating_day(&Broken, date(2025, 1, 5)).await);
    }

    #[tokio::test]
    async fn test_next_operating_day_skips_closed_override() {
        let calendar = OperatingCalendar::default();
        let closed_tuesday = date(2025, 1, 7);
        let rows = Rows(HashMap::from([(
            closed_tuesday,
            CapacityDay::new(closed_tuesday, false, true),
        )]));

        // From Sunday the 5th: Tuesday is closed, so Wednesday the 8th.
        let next = calendar.next_operating_day(&rows, date(2025, 1, 5)).await;
        assert_eq!(next, Some(date(2025, 1, 8)));
    }

    #[tokio::test]
    async fn test_next_operating_day_none_for_closed_calendar() {
        let calendar = OperatingCalendar::new(Vec::<Weekday>::new());
        let rows = Rows(HashMap::new());
        assert_eq!(calendar.next_operating_day(&rows, date(2025, 1, 5)).await, None);
    }
}
