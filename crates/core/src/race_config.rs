//! Race configuration input: validation and normalization.
//!
//! The dashboard form speaks minutes and local date-times; storage speaks
//! seconds and UTC instants. [`RaceInput::normalize`] is the only place that
//! converts between the two.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::error::{CoreError, CoreResult};
use crate::race::{IntervalPolicy, Race, RaceKind, RaceStatus};
use crate::types::Timestamp;

/// Seconds per input minute.
const SECONDS_PER_MINUTE: i64 = 60;

/// Largest value any stored integer column accepts (PostgreSQL `INTEGER`).
const MAX_STORED_INT: i64 = i32::MAX as i64;

/// Naive formats accepted for `scheduled_start` (HTML `datetime-local` and friends).
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

// ---------------------------------------------------------------------------
// Input DTO
// ---------------------------------------------------------------------------

/// Race creation / edit payload as submitted by the dashboard.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RaceInput {
    #[validate(length(min = 1, max = 200, message = "name must be between 1 and 200 characters"))]
    pub name: String,
    pub kind: RaceKind,
    #[validate(range(min = 1, message = "lap_distance_meters must be greater than 0"))]
    pub lap_distance_meters: i64,
    #[validate(range(min = 1, message = "base_interval_minutes must be greater than 0"))]
    pub base_interval_minutes: i64,
    /// Required for frontyard races, forced to 0 for backyard races.
    #[serde(default)]
    pub lap_reduction_minutes: Option<i64>,
    /// Empty or absent means "start manually".
    #[serde(default)]
    pub scheduled_start: Option<String>,
}

/// Validated configuration, in storage units.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceConfig {
    pub name: String,
    pub lap_distance_meters: u32,
    pub policy: IntervalPolicy,
    pub scheduled_start_at: Option<Timestamp>,
}

impl RaceConfig {
    pub fn kind(&self) -> RaceKind {
        self.policy.kind()
    }
}

impl RaceInput {
    /// Validate the payload and convert it to storage units.
    ///
    /// Naive scheduled start times are interpreted at `schedule_offset`.
    pub fn normalize(&self, schedule_offset: FixedOffset) -> CoreResult<RaceConfig> {
        self.validate()
            .map_err(|e| CoreError::Validation(describe_validation_errors(&e)))?;

        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("name must not be blank".into()));
        }

        let lap_distance_meters = to_stored_u32(self.lap_distance_meters, "lap_distance_meters")?;
        let base_interval_seconds =
            minutes_to_seconds(self.base_interval_minutes, "base_interval_minutes")?;

        let lap_reduction_seconds = match self.kind {
            RaceKind::FixedInterval => 0,
            RaceKind::ShrinkingInterval => {
                let minutes = self.lap_reduction_minutes.ok_or_else(|| {
                    CoreError::Validation(
                        "lap_reduction_minutes is required for frontyard races".into(),
                    )
                })?;
                if minutes < 0 {
                    return Err(CoreError::Validation(
                        "lap_reduction_minutes must not be negative".into(),
                    ));
                }
                minutes_to_seconds(minutes, "lap_reduction_minutes")?
            }
        };

        let scheduled_start_at = match self.scheduled_start.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_scheduled_start(raw, schedule_offset)?),
        };

        Ok(RaceConfig {
            name: name.to_string(),
            lap_distance_meters,
            policy: IntervalPolicy::new(self.kind, base_interval_seconds, lap_reduction_seconds),
            scheduled_start_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert whole minutes to seconds, rejecting values storage cannot hold.
pub fn minutes_to_seconds(minutes: i64, field: &str) -> CoreResult<u32> {
    let seconds = minutes
        .checked_mul(SECONDS_PER_MINUTE)
        .ok_or_else(|| out_of_range(field))?;
    to_stored_u32(seconds, field)
}

fn to_stored_u32(value: i64, field: &str) -> CoreResult<u32> {
    if (0..=MAX_STORED_INT).contains(&value) {
        Ok(value as u32)
    } else {
        Err(out_of_range(field))
    }
}

fn out_of_range(field: &str) -> CoreError {
    CoreError::Validation(format!("{field} is out of range"))
}

/// Parse a scheduled start.
///
/// RFC 3339 values carry their own offset; naive values are read at `offset`.
pub fn parse_scheduled_start(raw: &str, offset: FixedOffset) -> CoreResult<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "scheduled_start '{raw}' is not a valid date and time"
            ))
        })
}

/// Changing the race format is only allowed before the race has started.
pub fn check_kind_change(existing: &Race, config: &RaceConfig) -> CoreResult<()> {
    if existing.kind != config.kind() && existing.status != RaceStatus::Draft {
        return Err(CoreError::Conflict(format!(
            "cannot change race kind from {} to {} once the race is {}",
            existing.kind.as_str(),
            config.kind().as_str(),
            existing.status.as_str(),
        )));
    }
    Ok(())
}

fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match e.message.as_deref() {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid ({})", e.code),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
