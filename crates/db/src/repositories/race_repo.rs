//! Repository for the `races` table.
//!
//! Every query filters on `owner_id` as well as `id`, so a foreign race is
//! indistinguishable from a missing one.

use lapwatch_core::race::RaceStatus;
use lapwatch_core::race_config::RaceConfig;
use lapwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::race::{to_db_int, RaceRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, kind, lap_distance_meters, base_interval_seconds, \
     lap_reduction_seconds, scheduled_start_at, status, current_lap, created_at";

/// Provides CRUD operations for races.
pub struct RaceRepo;

impl RaceRepo {
    /// Insert a new draft race, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: &str,
        config: &RaceConfig,
    ) -> Result<RaceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO races
                (owner_id, name, kind, lap_distance_meters, base_interval_seconds,
                 lap_reduction_seconds, scheduled_start_at, status, current_lap)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RaceRow>(&query)
            .bind(owner_id)
            .bind(&config.name)
            .bind(config.kind().as_str())
            .bind(to_db_int(config.lap_distance_meters))
            .bind(to_db_int(config.policy.base_interval_seconds()))
            .bind(to_db_int(config.policy.lap_reduction_seconds()))
            .bind(config.scheduled_start_at)
            .bind(RaceStatus::Draft.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a race by id within an owner's races.
    pub async fn find_for_owner(
        pool: &PgPool,
        owner_id: &str,
        id: DbId,
    ) -> Result<Option<RaceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM races WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, RaceRow>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's races, most recently created first.
    pub async fn list_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<RaceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM races WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, RaceRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the configuration columns. `status` and `current_lap` are untouched.
    ///
    /// Once a race has left draft, `scheduled_start_at` holds its actual
    /// start and is kept. Returns `None` if no matching row exists.
    pub async fn update_config(
        pool: &PgPool,
        owner_id: &str,
        id: DbId,
        config: &RaceConfig,
    ) -> Result<Option<RaceRow>, sqlx::Error> {
        let query = format!(
            "UPDATE races SET
                name = $3,
                kind = $4,
                lap_distance_meters = $5,
                base_interval_seconds = $6,
                lap_reduction_seconds = $7,
                scheduled_start_at = CASE
                    WHEN status IN ('draft', 'not_started') THEN $8
                    ELSE scheduled_start_at
                END
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RaceRow>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(&config.name)
            .bind(config.kind().as_str())
            .bind(to_db_int(config.lap_distance_meters))
            .bind(to_db_int(config.policy.base_interval_seconds()))
            .bind(to_db_int(config.policy.lap_reduction_seconds()))
            .bind(config.scheduled_start_at)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a race. Returns the number of rows removed.
    pub async fn delete_for_owner(pool: &PgPool, owner_id: &str, id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM races WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Mark a race active and record its start. Completed races are left alone.
    pub async fn mark_active(
        pool: &PgPool,
        owner_id: &str,
        id: DbId,
        started_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE races SET status = $3, scheduled_start_at = $4
             WHERE id = $1 AND owner_id = $2 AND status <> $5",
        )
        .bind(id)
        .bind(owner_id)
        .bind(RaceStatus::Active.as_str())
        .bind(started_at)
        .bind(RaceStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a race completed.
    pub async fn mark_completed(pool: &PgPool, owner_id: &str, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE races SET status = $3 WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .bind(RaceStatus::Completed.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the completed-lap count. Completed races are left alone.
    pub async fn record_lap(
        pool: &PgPool,
        owner_id: &str,
        id: DbId,
        current_lap: u32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE races SET current_lap = $3
             WHERE id = $1 AND owner_id = $2 AND status <> $4",
        )
        .bind(id)
        .bind(owner_id)
        .bind(to_db_int(current_lap))
        .bind(RaceStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
