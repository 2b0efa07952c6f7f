//! Race event bus and in-process subscribers.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`RaceEvent`]: the event envelope published by running race clocks.
//! - [`WriteFailureMonitor`]: background subscriber that surfaces failed
//!   timer writes through logs and a counter.

pub mod bus;
pub mod monitor;

pub use bus::{EventBus, RaceEvent};
pub use monitor::WriteFailureMonitor;
