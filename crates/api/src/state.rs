use std::sync::Arc;

use lapwatch_core::clock::Clock;
use lapwatch_core::store::RaceStore;
use lapwatch_events::{EventBus, WriteFailureMonitor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::engine::{ClockDeps, ClockRegistry};
use crate::manager::RaceConfigManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Race persistence (Postgres in production, in-memory in tests).
    pub store: Arc<dyn RaceStore>,
    pub config: Arc<ServerConfig>,
    /// Wall clock used by timers and result summaries.
    pub clock: Arc<dyn Clock>,
    pub races: Arc<RaceConfigManager>,
    /// Loaded race timers.
    pub clocks: Arc<ClockRegistry>,
    pub event_bus: Arc<EventBus>,
    pub write_monitor: Arc<WriteFailureMonitor>,
}

impl AppState {
    /// Wire the race services around a store and a clock.
    pub fn new(store: Arc<dyn RaceStore>, config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let clocks = Arc::new(ClockRegistry::new(ClockDeps {
            store: Arc::clone(&store),
            clock: Arc::clone(&clock),
            event_bus: Arc::clone(&event_bus),
        }));
        let races = Arc::new(RaceConfigManager::new(
            Arc::clone(&store),
            Arc::clone(&clocks),
            config.schedule_offset,
        ));

        Self {
            store,
            config: Arc::new(config),
            clock,
            races,
            clocks,
            event_bus,
            write_monitor: Arc::new(WriteFailureMonitor::new()),
        }
    }

    /// Spawn the write failure monitor on this state's event bus.
    pub fn spawn_write_monitor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(
            Arc::clone(&self.write_monitor).run(self.event_bus.subscribe(), cancel),
        )
    }
}
