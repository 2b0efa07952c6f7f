//! Race entity, kind/status enums and the interval policy.
//!
//! The interval policy is the single source of truth for how long each lap
//! window lasts. Everything that needs an interval (the timer, the results
//! view, the configuration manager) goes through [`IntervalPolicy`].

use serde::{Deserialize, Serialize};

use crate::types::{DbId, OwnerId, Timestamp};

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Race format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaceKind {
    /// Backyard ultra: every lap has the same window.
    #[serde(rename = "backyard")]
    FixedInterval,
    /// Frontyard ultra: the window shrinks by a fixed amount per completed lap.
    #[serde(rename = "frontyard")]
    ShrinkingInterval,
}

impl RaceKind {
    /// Wire / storage name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            RaceKind::FixedInterval => "backyard",
            RaceKind::ShrinkingInterval => "frontyard",
        }
    }

    /// Human-readable label shown on the timer display.
    pub fn label(self) -> &'static str {
        match self {
            RaceKind::FixedInterval => "Backyard Ultra",
            RaceKind::ShrinkingInterval => "Frontyard Ultra",
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Canonical race lifecycle status.
///
/// The legacy names `not_started` and `in_progress` are accepted when
/// deserializing; the canonical names are always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    #[serde(alias = "not_started")]
    Draft,
    #[serde(alias = "in_progress")]
    Active,
    Completed,
}

impl RaceStatus {
    /// Canonical storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            RaceStatus::Draft => "draft",
            RaceStatus::Active => "active",
            RaceStatus::Completed => "completed",
        }
    }

    /// `Completed` admits no further lap or status mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, RaceStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// Interval policy
// ---------------------------------------------------------------------------

/// How long the lap window is, as a function of laps already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalPolicy {
    Fixed {
        base_interval_seconds: u32,
    },
    Shrinking {
        base_interval_seconds: u32,
        lap_reduction_seconds: u32,
    },
}

impl IntervalPolicy {
    /// Build the policy for `kind`. The reduction is ignored for fixed races.
    pub fn new(kind: RaceKind, base_interval_seconds: u32, lap_reduction_seconds: u32) -> Self {
        match kind {
            RaceKind::FixedInterval => IntervalPolicy::Fixed {
                base_interval_seconds,
            },
            RaceKind::ShrinkingInterval => IntervalPolicy::Shrinking {
                base_interval_seconds,
                lap_reduction_seconds,
            },
        }
    }

    pub fn kind(&self) -> RaceKind {
        match self {
            IntervalPolicy::Fixed { .. } => RaceKind::FixedInterval,
            IntervalPolicy::Shrinking { .. } => RaceKind::ShrinkingInterval,
        }
    }

    pub fn base_interval_seconds(&self) -> u32 {
        match *self {
            IntervalPolicy::Fixed {
                base_interval_seconds,
            }
            | IntervalPolicy::Shrinking {
                base_interval_seconds,
                ..
            } => base_interval_seconds,
        }
    }

    /// Per-lap reduction; always 0 for fixed races.
    pub fn lap_reduction_seconds(&self) -> u32 {
        match *self {
            IntervalPolicy::Fixed { .. } => 0,
            IntervalPolicy::Shrinking {
                lap_reduction_seconds,
                ..
            } => lap_reduction_seconds,
        }
    }

    /// Window for the lap that starts after `completed_laps` laps.
    ///
    /// Shrinking races clamp at zero: `max(0, base - reduction * completed_laps)`.
    pub fn effective_interval(&self, completed_laps: u32) -> u32 {
        match *self {
            IntervalPolicy::Fixed {
                base_interval_seconds,
            } => base_interval_seconds,
            IntervalPolicy::Shrinking {
                base_interval_seconds,
                lap_reduction_seconds,
            } => base_interval_seconds
                .saturating_sub(lap_reduction_seconds.saturating_mul(completed_laps)),
        }
    }
}

// ---------------------------------------------------------------------------
// Race
// ---------------------------------------------------------------------------

/// A stored race record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: DbId,
    pub owner_id: OwnerId,
    pub name: String,
    pub kind: RaceKind,
    pub lap_distance_meters: u32,
    pub base_interval_seconds: u32,
    pub lap_reduction_seconds: u32,
    pub scheduled_start_at: Option<Timestamp>,
    pub status: RaceStatus,
    /// Number of completed laps, not the lap currently being run.
    pub current_lap: u32,
    pub created_at: Timestamp,
}

impl Race {
    pub fn interval_policy(&self) -> IntervalPolicy {
        IntervalPolicy::new(
            self.kind,
            self.base_interval_seconds,
            self.lap_reduction_seconds,
        )
    }

    /// Distance covered by a runner who finished every completed lap.
    pub fn distance_covered_meters(&self) -> u64 {
        u64::from(self.lap_distance_meters) * u64::from(self.current_lap)
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
