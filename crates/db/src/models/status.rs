//! Mapping tables between stored text values and domain enums.
//!
//! Older rows use `not_started` / `in_progress`; they are read as
//! `Draft` / `Active`. Writes always use [`RaceStatus::as_str`].

use lapwatch_core::race::{RaceKind, RaceStatus};

/// Every status value the `races.status` column may hold.
const STATUS_VALUES: &[(&str, RaceStatus)] = &[
    ("draft", RaceStatus::Draft),
    ("not_started", RaceStatus::Draft),
    ("active", RaceStatus::Active),
    ("in_progress", RaceStatus::Active),
    ("completed", RaceStatus::Completed),
];

/// Every kind value the `races.kind` column may hold.
const KIND_VALUES: &[(&str, RaceKind)] = &[
    ("backyard", RaceKind::FixedInterval),
    ("frontyard", RaceKind::ShrinkingInterval),
];

/// Decode a stored status, accepting legacy aliases.
pub fn status_from_db(raw: &str) -> Option<RaceStatus> {
    STATUS_VALUES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, status)| *status)
}

pub fn kind_from_db(raw: &str) -> Option<RaceKind> {
    KIND_VALUES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, kind)| *kind)
}
