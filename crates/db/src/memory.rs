//! In-memory [`RaceStore`] for tests and database-less local runs.
//!
//! Behaves like [`PgRaceStore`](crate::PgRaceStore): owner-scoped filters,
//! newest-first listing, no status or lap writes on completed races.
//! [`MemoryRaceStore::fail_writes`] simulates a backend outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use lapwatch_core::error::{CoreError, CoreResult};
use lapwatch_core::race::{Race, RaceStatus};
use lapwatch_core::race_config::RaceConfig;
use lapwatch_core::store::RaceStore;
use lapwatch_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryRaceStore {
    races: RwLock<HashMap<DbId, Race>>,
    last_id: AtomicI64,
    failing: AtomicBool,
    timer_writes: AtomicU64,
}

impl MemoryRaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (reads keep working) until reset.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful status and lap writes so far.
    pub fn timer_writes(&self) -> u64 {
        self.timer_writes.load(Ordering::SeqCst)
    }

    /// Read a race regardless of owner.
    pub async fn peek(&self, id: DbId) -> Option<Race> {
        self.races.read().await.get(&id).cloned()
    }

    /// Store a race as-is, keeping its id. Used to seed fixtures.
    pub async fn seed(&self, race: Race) {
        self.last_id.fetch_max(race.id, Ordering::SeqCst);
        self.races.write().await.insert(race.id, race);
    }

    fn check_writable(&self) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CoreError::Persistence("simulated write failure".into()))
        } else {
            Ok(())
        }
    }

    /// Apply `f` to an owned race that is not yet completed.
    async fn timer_write(&self, owner_id: &str, id: DbId, f: impl FnOnce(&mut Race)) -> CoreResult<bool> {
        self.check_writable()?;
        let mut races = self.races.write().await;
        match races.get_mut(&id) {
            Some(race) if race.is_owned_by(owner_id) && !race.status.is_terminal() => {
                f(race);
                self.timer_writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn apply_config(race: &mut Race, config: &RaceConfig) {
    race.name = config.name.clone();
    race.kind = config.kind();
    race.lap_distance_meters = config.lap_distance_meters;
    race.base_interval_seconds = config.policy.base_interval_seconds();
    race.lap_reduction_seconds = config.policy.lap_reduction_seconds();
    // After the start, this column records when the race actually began.
    if race.status == RaceStatus::Draft {
        race.scheduled_start_at = config.scheduled_start_at;
    }
}

#[async_trait]
impl RaceStore for MemoryRaceStore {
    async fn insert(&self, owner_id: &str, config: &RaceConfig) -> CoreResult<Race> {
        self.check_writable()?;
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut race = Race {
            id,
            owner_id: owner_id.to_string(),
            name: String::new(),
            kind: config.kind(),
            lap_distance_meters: 0,
            base_interval_seconds: 0,
            lap_reduction_seconds: 0,
            scheduled_start_at: None,
            status: RaceStatus::Draft,
            current_lap: 0,
            created_at: Utc::now(),
        };
        apply_config(&mut race, config);
        self.races.write().await.insert(id, race.clone());
        Ok(race)
    }

    async fn find(&self, owner_id: &str, id: DbId) -> CoreResult<Option<Race>> {
        Ok(self
            .races
            .read()
            .await
            .get(&id)
            .filter(|race| race.is_owned_by(owner_id))
            .cloned())
    }

    async fn list(&self, owner_id: &str) -> CoreResult<Vec<Race>> {
        let mut races: Vec<Race> = self
            .races
            .read()
            .await
            .values()
            .filter(|race| race.is_owned_by(owner_id))
            .cloned()
            .collect();
        races.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(races)
    }

    async fn update_config(
        &self,
        owner_id: &str,
        id: DbId,
        config: &RaceConfig,
    ) -> CoreResult<Option<Race>> {
        self.check_writable()?;
        let mut races = self.races.write().await;
        Ok(races
            .get_mut(&id)
            .filter(|race| race.is_owned_by(owner_id))
            .map(|race| {
                apply_config(race, config);
                race.clone()
            }))
    }

    async fn delete(&self, owner_id: &str, id: DbId) -> CoreResult<u64> {
        self.check_writable()?;
        let mut races = self.races.write().await;
        match races.get(&id) {
            Some(race) if race.is_owned_by(owner_id) => {
                races.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn mark_active(
        &self,
        owner_id: &str,
        id: DbId,
        started_at: Timestamp,
    ) -> CoreResult<bool> {
        self.timer_write(owner_id, id, |race| {
            race.status = RaceStatus::Active;
            race.scheduled_start_at = Some(started_at);
        })
        .await
    }

    async fn mark_completed(&self, owner_id: &str, id: DbId) -> CoreResult<bool> {
        self.check_writable()?;
        let mut races = self.races.write().await;
        match races.get_mut(&id) {
            Some(race) if race.is_owned_by(owner_id) => {
                race.status = RaceStatus::Completed;
                self.timer_writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_lap(&self, owner_id: &str, id: DbId, current_lap: u32) -> CoreResult<bool> {
        self.timer_write(owner_id, id, |race| race.current_lap = current_lap)
            .await
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}
