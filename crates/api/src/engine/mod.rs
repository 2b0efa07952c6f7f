//! Race timer runtime: per-race clocks and the registry that owns them.

pub mod clock;
pub mod registry;

pub use clock::{ClockDeps, RaceClock};
pub use registry::ClockRegistry;
