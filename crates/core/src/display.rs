//! Display formatting for the race dashboard.
//!
//! The dashboard is Swedish-language; units follow its labels
//! ("minuter", "meter", "km").

/// Seconds per hour.
const SECS_PER_HOUR: u64 = 3600;

/// Seconds per minute.
const SECS_PER_MINUTE: u64 = 60;

/// Clock face for a countdown: `m:ss`, or `h:mm:ss` once an hour or more remains.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / SECS_PER_HOUR;
    let minutes = (seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = seconds % SECS_PER_MINUTE;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Elapsed race time, always `h:mm:ss`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / SECS_PER_HOUR;
    let minutes = (seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = seconds % SECS_PER_MINUTE;
    format!("{hours}:{minutes:02}:{secs:02}")
}

/// An interval or reduction stored in seconds, shown in minutes.
pub fn format_minutes(seconds: u32) -> String {
    if u64::from(seconds) % SECS_PER_MINUTE == 0 {
        format!("{} minuter", u64::from(seconds) / SECS_PER_MINUTE)
    } else {
        format!("{} minuter", f64::from(seconds) / SECS_PER_MINUTE as f64)
    }
}

/// Total distance: plain meters below one kilometer, otherwise km with two decimals.
pub fn format_distance(meters: u64) -> String {
    if meters < 1000 {
        format!("{meters} meter")
    } else {
        format!("{:.2} km", meters as f64 / 1000.0)
    }
}

/// Running distance on the timer display, km with one decimal.
pub fn format_km(meters: u64) -> String {
    format!("{:.1} km", meters as f64 / 1000.0)
}
