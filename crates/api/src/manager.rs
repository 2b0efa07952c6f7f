//! Race configuration manager: owner-scoped CRUD over stored races.

use std::sync::Arc;

use chrono::FixedOffset;
use lapwatch_core::error::{CoreError, CoreResult};
use lapwatch_core::race::{Race, RaceStatus};
use lapwatch_core::race_config::{check_kind_change, RaceInput};
use lapwatch_core::store::RaceStore;
use lapwatch_core::types::DbId;

use crate::engine::ClockRegistry;

pub struct RaceConfigManager {
    store: Arc<dyn RaceStore>,
    clocks: Arc<ClockRegistry>,
    /// Offset for scheduled starts submitted without one.
    schedule_offset: FixedOffset,
}

impl RaceConfigManager {
    pub fn new(
        store: Arc<dyn RaceStore>,
        clocks: Arc<ClockRegistry>,
        schedule_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            clocks,
            schedule_offset,
        }
    }

    /// Validate `input` and store it as a new draft race.
    pub async fn create_race(&self, owner_id: &str, input: &RaceInput) -> CoreResult<Race> {
        let config = input.normalize(self.schedule_offset)?;
        let race = self.store.insert(owner_id, &config).await?;
        tracing::info!(
            race_id = race.id,
            owner_id,
            kind = race.kind.as_str(),
            "Race created"
        );
        Ok(race)
    }

    /// Replace a race's configuration. Status and lap count are never touched,
    /// and neither is the recorded start of a race that has left draft.
    ///
    /// A loaded draft timer is torn down before the write and reloaded from
    /// the stored result, so it never starts on a superseded schedule. A
    /// running timer keeps the configuration it was loaded with.
    pub async fn update_race(
        &self,
        owner_id: &str,
        race_id: DbId,
        input: &RaceInput,
    ) -> CoreResult<Race> {
        let config = input.normalize(self.schedule_offset)?;
        let existing = self.get_race(owner_id, race_id).await?;
        check_kind_change(&existing, &config)?;

        let was_loaded = existing.status == RaceStatus::Draft
            && self.clocks.teardown(owner_id, race_id).await;

        let updated = self
            .store
            .update_config(owner_id, race_id, &config)
            .await
            .and_then(|race| race.ok_or_else(|| not_found(race_id)));

        if was_loaded {
            if let Err(err) = self.clocks.load(owner_id, race_id).await {
                tracing::warn!(
                    race_id,
                    owner_id,
                    error = %err,
                    "Failed to reload race timer after edit"
                );
            }
        }

        let race = updated?;
        tracing::info!(race_id, owner_id, "Race updated");
        Ok(race)
    }

    /// Delete a race and tear down its timer. Deleting a missing or foreign
    /// race succeeds without effect.
    pub async fn delete_race(&self, owner_id: &str, race_id: DbId) -> CoreResult<()> {
        self.clocks.teardown(owner_id, race_id).await;
        let removed = self.store.delete(owner_id, race_id).await?;
        if removed > 0 {
            tracing::info!(race_id, owner_id, "Race deleted");
        } else {
            tracing::debug!(race_id, owner_id, "Delete matched no race");
        }
        Ok(())
    }

    /// All of the owner's races, newest first.
    pub async fn list_races(&self, owner_id: &str) -> CoreResult<Vec<Race>> {
        self.store.list(owner_id).await
    }

    pub async fn get_race(&self, owner_id: &str, race_id: DbId) -> CoreResult<Race> {
        self.store
            .find(owner_id, race_id)
            .await?
            .ok_or_else(|| not_found(race_id))
    }
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Race", id }
}
