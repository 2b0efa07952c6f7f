//! Race row model.

use lapwatch_core::error::CoreError;
use lapwatch_core::race::Race;
use lapwatch_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::status::{kind_from_db, status_from_db};

/// A row from the `races` table.
#[derive(Debug, Clone, FromRow)]
pub struct RaceRow {
    pub id: DbId,
    pub owner_id: String,
    pub name: String,
    pub kind: String,
    pub lap_distance_meters: i32,
    pub base_interval_seconds: i32,
    pub lap_reduction_seconds: i32,
    pub scheduled_start_at: Option<Timestamp>,
    pub status: String,
    pub current_lap: i32,
    pub created_at: Timestamp,
}

impl TryFrom<RaceRow> for Race {
    type Error = CoreError;

    fn try_from(row: RaceRow) -> Result<Self, Self::Error> {
        let kind = kind_from_db(&row.kind).ok_or_else(|| {
            CoreError::Persistence(format!("race {} has unknown kind '{}'", row.id, row.kind))
        })?;
        let status = status_from_db(&row.status).ok_or_else(|| {
            CoreError::Persistence(format!(
                "race {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Race {
            id: row.id,
            kind,
            status,
            lap_distance_meters: non_negative(row.id, "lap_distance_meters", row.lap_distance_meters)?,
            base_interval_seconds: non_negative(
                row.id,
                "base_interval_seconds",
                row.base_interval_seconds,
            )?,
            lap_reduction_seconds: non_negative(
                row.id,
                "lap_reduction_seconds",
                row.lap_reduction_seconds,
            )?,
            current_lap: non_negative(row.id, "current_lap", row.current_lap)?,
            owner_id: row.owner_id,
            name: row.name,
            scheduled_start_at: row.scheduled_start_at,
            created_at: row.created_at,
        })
    }
}

fn non_negative(id: DbId, column: &str, value: i32) -> Result<u32, CoreError> {
    u32::try_from(value).map_err(|_| {
        CoreError::Persistence(format!("race {id} has negative {column} ({value})"))
    })
}

/// Clamp a validated domain value into an `INTEGER` column.
pub fn to_db_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
