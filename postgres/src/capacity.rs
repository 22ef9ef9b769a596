//! Per-date capacity rows.

use crate::{database_error, decode_error};
use chrono::{Datelike, NaiveDate};
use relief_desk_core::{BoxFuture, CapacityDay, CapacityStore, Category, StoreError};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

/// `PostgreSQL`-backed [`CapacityStore`] over the `capacity_days` table.
#[derive(Clone, Debug)]
pub struct PostgresCapacityStore {
    pool: PgPool,
}

impl PostgresCapacityStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace the row for `day.date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    pub async fn upsert(&self, day: &CapacityDay) -> Result<(), StoreError> {
        let limits: Map<String, Value> = day
            .max_by_category
            .iter()
            .map(|(category, max)| (category.as_str().to_string(), Value::from(*max)))
            .collect();
        #[allow(clippy::cast_possible_truncation)] // 1..=7
        let day_of_week = day.date.weekday().number_from_monday() as i16;

        sqlx::query(
            r"
            INSERT INTO capacity_days (date, day_of_week, max_by_category, is_operating_day, is_override)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (date) DO UPDATE
            SET day_of_week = EXCLUDED.day_of_week,
                max_by_category = EXCLUDED.max_by_category,
                is_operating_day = EXCLUDED.is_operating_day,
                is_override = EXCLUDED.is_override,
                updated_at = now()
            ",
        )
        .bind(day.date)
        .bind(day_of_week)
        .bind(Value::Object(limits))
        .bind(day.is_operating_day)
        .bind(day.is_override)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        tracing::info!(
            date = %day.date,
            is_operating_day = day.is_operating_day,
            is_override = day.is_override,
            "Capacity day saved"
        );
        Ok(())
    }

    /// Delete the row for `date`, reverting it to the weekday rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    pub async fn remove(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM capacity_days WHERE date = $1")
            .bind(date)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Option<CapacityDay>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT date, max_by_category, is_operating_day, is_override
            FROM capacity_days
            WHERE date = $1
            ",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let limits: Value = row.try_get("max_by_category").map_err(database_error)?;
        let mut day = CapacityDay::new(
            row.try_get("date").map_err(database_error)?,
            row.try_get("is_operating_day").map_err(database_error)?,
            row.try_get("is_override").map_err(database_error)?,
        );
        day.max_by_category = parse_limits(date, &limits)?;
        Ok(Some(day))
    }
}

impl CapacityStore for PostgresCapacityStore {
    fn get_capacity_day(
        &self,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Option<CapacityDay>, StoreError>> {
        Box::pin(self.fetch(date))
    }
}

/// Decode `max_by_category`.
///
/// Unknown category keys are skipped. Values are kept as stored, negatives
/// included; the registry decides what to do with them. Anything that is not
/// an integer makes the whole row unreadable.
fn parse_limits(date: NaiveDate, limits: &Value) -> Result<HashMap<Category, i32>, StoreError> {
    let Value::Object(entries) = limits else {
        return Err(decode_error("max_by_category", "expected a JSON object"));
    };

    let mut parsed = HashMap::new();
    for (key, value) in entries {
        let Ok(category) = key.parse::<Category>() else {
            tracing::warn!(date = %date, key = %key, "Ignoring unknown capacity category");
            continue;
        };
        let max = value
            .as_i64()
            .ok_or_else(|| decode_error("max_by_category", format!("{key} is not an integer")))?;
        #[allow(clippy::cast_possible_truncation)] // clamped into range first
        let max = max.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        parsed.insert(category, max);
    }
    Ok(parsed)
}
