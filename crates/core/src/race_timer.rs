//! Race timer state machine.
//!
//! [`RaceTimer`] is a pure projection of a stored race. The host calls
//! [`RaceTimer::on_tick`] once per second and the explicit transitions
//! ([`start`](RaceTimer::start), [`stop`](RaceTimer::stop),
//! [`complete_lap`](RaceTimer::complete_lap)) on user request. Every call
//! returns the [`TimerEffect`]s the host must persist; the timer itself never
//! performs I/O and never reads the wall clock.
//!
//! ```text
//! AwaitingSchedule --(now >= scheduled start)--> Running
//! Idle ------------------(start)---------------> Running
//! Running --------(countdown hits 0 / lap)-----> Running   (lap + 1)
//! Running -----------(stop, confirmed)---------> Completed (terminal)
//! ```

use serde::Serialize;

use crate::display::{format_clock, format_km};
use crate::error::CoreError;
use crate::race::{IntervalPolicy, Race, RaceKind, RaceStatus};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Phases, effects, errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Draft race with a scheduled start still in the future.
    AwaitingSchedule,
    /// Draft race waiting for a manual start.
    Idle,
    Running,
    Completed,
}

/// A write the host owes the persistence layer after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEffect {
    /// Persist `status = active` and record `started_at` as the start time.
    MarkActive { started_at: Timestamp },
    /// Persist the new completed-lap count.
    RecordLap { current_lap: u32 },
    /// Persist `status = completed`.
    MarkCompleted,
}

/// Rejected transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("race is already completed")]
    AlreadyCompleted,

    #[error("race is scheduled to start at {0}")]
    AwaitingSchedule(Timestamp),

    #[error("race is not running")]
    NotRunning,

    #[error("stopping a race is irreversible and requires confirmation")]
    ConfirmationRequired,
}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::ConfirmationRequired => CoreError::Validation(err.to_string()),
            other => CoreError::Conflict(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of a timer, shaped for the timer display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub race_id: DbId,
    pub kind: RaceKind,
    pub phase: TimerPhase,
    /// Seconds until the scheduled start (AwaitingSchedule) or the next lap boundary.
    pub countdown_seconds: u32,
    pub countdown_display: String,
    pub completed_laps: u32,
    /// The lap currently being run (1-based).
    pub lap_number: u32,
    pub effective_interval_seconds: u32,
    pub scheduled_start_at: Option<Timestamp>,
    pub distance_meters: u64,
    pub distance_display: String,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceTimer {
    race_id: DbId,
    policy: IntervalPolicy,
    lap_distance_meters: u32,
    phase: TimerPhase,
    scheduled_start_at: Option<Timestamp>,
    countdown_remaining: u32,
    current_lap: u32,
    effective_interval_seconds: u32,
}

impl RaceTimer {
    /// Project a stored race into a timer at time `now`.
    ///
    /// A draft whose scheduled start is already due goes straight to
    /// `Running`; the returned effects carry the status write.
    pub fn load(race: &Race, now: Timestamp) -> (Self, Vec<TimerEffect>) {
        let policy = race.interval_policy();
        let effective = policy.effective_interval(race.current_lap);
        let mut timer = Self {
            race_id: race.id,
            policy,
            lap_distance_meters: race.lap_distance_meters,
            phase: TimerPhase::Idle,
            scheduled_start_at: race.scheduled_start_at,
            countdown_remaining: effective,
            current_lap: race.current_lap,
            effective_interval_seconds: effective,
        };

        let effects = match (race.status, race.scheduled_start_at) {
            (RaceStatus::Completed, _) => {
                timer.phase = TimerPhase::Completed;
                timer.countdown_remaining = 0;
                Vec::new()
            }
            (RaceStatus::Active, _) => {
                timer.phase = TimerPhase::Running;
                Vec::new()
            }
            (RaceStatus::Draft, Some(at)) => match seconds_until(at, now) {
                0 => timer.enter_running(at),
                remaining => {
                    timer.phase = TimerPhase::AwaitingSchedule;
                    timer.countdown_remaining = remaining;
                    Vec::new()
                }
            },
            (RaceStatus::Draft, None) => Vec::new(),
        };

        (timer, effects)
    }

    /// Advance the timer by one tick.
    pub fn on_tick(&mut self, now: Timestamp) -> Vec<TimerEffect> {
        match self.phase {
            TimerPhase::AwaitingSchedule => {
                let Some(at) = self.scheduled_start_at else {
                    self.phase = TimerPhase::Idle;
                    return Vec::new();
                };
                match seconds_until(at, now) {
                    0 => self.enter_running(at),
                    remaining => {
                        self.countdown_remaining = remaining;
                        Vec::new()
                    }
                }
            }
            TimerPhase::Running => {
                // The displayed zero is transient: the boundary fires in the
                // same tick that would show it.
                if self.countdown_remaining <= 1 {
                    self.lap_boundary()
                } else {
                    self.countdown_remaining -= 1;
                    Vec::new()
                }
            }
            TimerPhase::Idle | TimerPhase::Completed => Vec::new(),
        }
    }

    /// Manual start. A no-op when already running.
    pub fn start(&mut self, now: Timestamp) -> Result<Vec<TimerEffect>, TimerError> {
        match self.phase {
            TimerPhase::Running => Ok(Vec::new()),
            TimerPhase::Completed => Err(TimerError::AlreadyCompleted),
            TimerPhase::AwaitingSchedule => Err(TimerError::AwaitingSchedule(
                self.scheduled_start_at.unwrap_or(now),
            )),
            TimerPhase::Idle => Ok(self.enter_running(self.scheduled_start_at.unwrap_or(now))),
        }
    }

    /// Manual, irreversible stop. A no-op when already completed.
    pub fn stop(&mut self, confirmed: bool) -> Result<Vec<TimerEffect>, TimerError> {
        match self.phase {
            TimerPhase::Completed => Ok(Vec::new()),
            TimerPhase::Running if !confirmed => Err(TimerError::ConfirmationRequired),
            TimerPhase::Running => {
                self.phase = TimerPhase::Completed;
                self.countdown_remaining = 0;
                Ok(vec![TimerEffect::MarkCompleted])
            }
            TimerPhase::Idle | TimerPhase::AwaitingSchedule => Err(TimerError::NotRunning),
        }
    }

    /// Record a lap completion now instead of waiting for the countdown.
    pub fn complete_lap(&mut self) -> Result<Vec<TimerEffect>, TimerError> {
        match self.phase {
            TimerPhase::Running => Ok(self.lap_boundary()),
            TimerPhase::Completed => Err(TimerError::AlreadyCompleted),
            TimerPhase::Idle | TimerPhase::AwaitingSchedule => Err(TimerError::NotRunning),
        }
    }

    fn enter_running(&mut self, started_at: Timestamp) -> Vec<TimerEffect> {
        self.phase = TimerPhase::Running;
        self.scheduled_start_at = Some(started_at);
        self.effective_interval_seconds = self.policy.effective_interval(self.current_lap);
        self.countdown_remaining = self.effective_interval_seconds;
        vec![TimerEffect::MarkActive { started_at }]
    }

    fn lap_boundary(&mut self) -> Vec<TimerEffect> {
        self.current_lap = self.current_lap.saturating_add(1);
        self.effective_interval_seconds = self.policy.effective_interval(self.current_lap);
        self.countdown_remaining = self.effective_interval_seconds;
        vec![TimerEffect::RecordLap {
            current_lap: self.current_lap,
        }]
    }

    pub fn race_id(&self) -> DbId {
        self.race_id
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn effective_interval_seconds(&self) -> u32 {
        self.effective_interval_seconds
    }

    pub fn is_completed(&self) -> bool {
        self.phase == TimerPhase::Completed
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let distance_meters = u64::from(self.lap_distance_meters) * u64::from(self.current_lap);
        TimerSnapshot {
            race_id: self.race_id,
            kind: self.policy.kind(),
            phase: self.phase,
            countdown_seconds: self.countdown_remaining,
            countdown_display: format_clock(u64::from(self.countdown_remaining)),
            completed_laps: self.current_lap,
            lap_number: self.current_lap.saturating_add(1),
            effective_interval_seconds: self.effective_interval_seconds,
            scheduled_start_at: self.scheduled_start_at,
            distance_meters,
            distance_display: format_km(distance_meters),
        }
    }
}

/// Whole seconds from `now` until `at`, rounded up, never negative.
fn seconds_until(at: Timestamp, now: Timestamp) -> u32 {
    let millis = (at - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u32::try_from((millis + 999) / 1000).unwrap_or(u32::MAX)
}
