//! PostgreSQL implementation of the [`RaceStore`] seam.

use async_trait::async_trait;
use lapwatch_core::error::{CoreError, CoreResult};
use lapwatch_core::race::Race;
use lapwatch_core::race_config::RaceConfig;
use lapwatch_core::store::RaceStore;
use lapwatch_core::types::{DbId, Timestamp};

use crate::repositories::RaceRepo;
use crate::DbPool;

/// [`RaceStore`] backed by the `races` table.
#[derive(Clone)]
pub struct PgRaceStore {
    pool: DbPool,
}

impl PgRaceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Log a database error and convert it to a sanitized persistence error.
fn persistence(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Race store query failed");
    CoreError::Persistence(err.to_string())
}

#[async_trait]
impl RaceStore for PgRaceStore {
    async fn insert(&self, owner_id: &str, config: &RaceConfig) -> CoreResult<Race> {
        let row = RaceRepo::create(&self.pool, owner_id, config)
            .await
            .map_err(persistence)?;
        Race::try_from(row)
    }

    async fn find(&self, owner_id: &str, id: DbId) -> CoreResult<Option<Race>> {
        RaceRepo::find_for_owner(&self.pool, owner_id, id)
            .await
            .map_err(persistence)?
            .map(Race::try_from)
            .transpose()
    }

    async fn list(&self, owner_id: &str) -> CoreResult<Vec<Race>> {
        RaceRepo::list_for_owner(&self.pool, owner_id)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(Race::try_from)
            .collect()
    }

    async fn update_config(
        &self,
        owner_id: &str,
        id: DbId,
        config: &RaceConfig,
    ) -> CoreResult<Option<Race>> {
        RaceRepo::update_config(&self.pool, owner_id, id, config)
            .await
            .map_err(persistence)?
            .map(Race::try_from)
            .transpose()
    }

    async fn delete(&self, owner_id: &str, id: DbId) -> CoreResult<u64> {
        RaceRepo::delete_for_owner(&self.pool, owner_id, id)
            .await
            .map_err(persistence)
    }

    async fn mark_active(
        &self,
        owner_id: &str,
        id: DbId,
        started_at: Timestamp,
    ) -> CoreResult<bool> {
        RaceRepo::mark_active(&self.pool, owner_id, id, started_at)
            .await
            .map_err(persistence)
    }

    async fn mark_completed(&self, owner_id: &str, id: DbId) -> CoreResult<bool> {
        RaceRepo::mark_completed(&self.pool, owner_id, id)
            .await
            .map_err(persistence)
    }

    async fn record_lap(&self, owner_id: &str, id: DbId, current_lap: u32) -> CoreResult<bool> {
        RaceRepo::record_lap(&self.pool, owner_id, id, current_lap)
            .await
            .map_err(persistence)
    }

    async fn ping(&self) -> CoreResult<()> {
        crate::health_check(&self.pool).await.map_err(persistence)
    }
}
