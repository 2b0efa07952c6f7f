//! Lapwatch domain core.
//!
//! Pure race logic with zero internal dependencies: the race model and its
//! interval policy, input normalization, the timer state machine, display
//! formatting, and the persistence / clock seams the runtime plugs into.

pub mod clock;
pub mod display;
pub mod error;
pub mod race;
pub mod race_config;
pub mod race_timer;
pub mod results;
pub mod store;
pub mod types;
