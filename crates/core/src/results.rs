//! Post-race summary shown on the results page.

use serde::Serialize;

use crate::display::{format_distance, format_duration, format_minutes};
use crate::race::{Race, RaceKind, RaceStatus};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceResults {
    pub race_id: DbId,
    pub name: String,
    pub kind: RaceKind,
    pub status: RaceStatus,
    pub completed_laps: u32,
    pub distance_meters: u64,
    pub distance_display: String,
    pub started_at: Option<Timestamp>,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub interval_display: String,
    /// Only present for frontyard races.
    pub lap_reduction_display: Option<String>,
}

impl RaceResults {
    /// Summarize `race` as of `now`.
    ///
    /// Elapsed time runs from the recorded start; a race that never left
    /// draft reports zero.
    pub fn summarize(race: &Race, now: Timestamp) -> Self {
        let started_at = match race.status {
            RaceStatus::Draft => None,
            RaceStatus::Active | RaceStatus::Completed => race.scheduled_start_at,
        };
        let elapsed_seconds = started_at
            .map(|at| u64::try_from((now - at).num_seconds()).unwrap_or(0))
            .unwrap_or(0);
        let distance_meters = race.distance_covered_meters();

        Self {
            race_id: race.id,
            name: race.name.clone(),
            kind: race.kind,
            status: race.status,
            completed_laps: race.current_lap,
            distance_meters,
            distance_display: format_distance(distance_meters),
            started_at,
            elapsed_seconds,
            elapsed_display: format_duration(elapsed_seconds),
            interval_display: format_minutes(race.base_interval_seconds),
            lap_reduction_display: match race.kind {
                RaceKind::FixedInterval => None,
                RaceKind::ShrinkingInterval => Some(format_minutes(race.lap_reduction_seconds)),
            },
        }
    }
}
