//! Background subscriber that surfaces failed race writes.
//!
//! Lap advances are written without waiting for the result, so a failing
//! store would otherwise go unnoticed. The monitor logs every
//! `race.write_failed` event and keeps a running count for `/health`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::RaceEvent;

#[derive(Debug, Default)]
pub struct WriteFailureMonitor {
    failures: AtomicU64,
}

impl WriteFailureMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failed writes observed since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Run until `cancel` fires or the bus is dropped.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<RaceEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Write failure monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Write failure monitor stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) if event.is_write_failure() => self.record(&event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Write failure monitor lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, write failure monitor stopping");
                        break;
                    }
                },
            }
        }
    }

    fn record(&self, event: &RaceEvent) {
        let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(
            race_id = event.race_id,
            owner_id = event.owner_id.as_deref().unwrap_or("-"),
            operation = event.payload["operation"].as_str().unwrap_or("unknown"),
            error = event.payload["error"].as_str().unwrap_or(""),
            total_failures = total,
            "Race write failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::{EventBus, RACE_LAP_COMPLETED, RACE_WRITE_FAILED};

    #[tokio::test]
    async fn counts_only_write_failures() {
        let bus = EventBus::default();
        let monitor = Arc::new(WriteFailureMonitor::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Arc::clone(&monitor).run(bus.subscribe(), cancel.clone()),
        );

        bus.publish(RaceEvent::new(RACE_LAP_COMPLETED, 1));
        bus.publish(
            RaceEvent::new(RACE_WRITE_FAILED, 1)
                .with_payload(serde_json::json!({"operation": "record_lap", "error": "down"})),
        );
        bus.publish(RaceEvent::new(RACE_WRITE_FAILED, 2));

        for _ in 0..50 {
            if monitor.failure_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(monitor.failure_count(), 2);

        cancel.cancel();
        handle.await.expect("monitor task should exit cleanly");
    }

    #[tokio::test]
    async fn stops_when_bus_is_dropped() {
        let bus = EventBus::default();
        let monitor = Arc::new(WriteFailureMonitor::new());
        let handle = tokio::spawn(monitor.run(bus.subscribe(), CancellationToken::new()));

        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop after the bus closes")
            .expect("monitor task should not panic");
    }
}
