//! Database row models.
//!
//! Rows mirror the table layout exactly; conversion into domain types
//! (and the legacy-value mapping that goes with it) happens here so nothing
//! above the adapter ever sees a raw column value.

pub mod race;
pub mod status;
