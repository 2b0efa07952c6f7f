//! Persistence seam for race records.
//!
//! Every method is scoped by owner: a race owned by someone else behaves
//! exactly like a race that does not exist. Status and lap writes never
//! touch a completed race.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::race::Race;
use crate::race_config::RaceConfig;
use crate::types::{DbId, Timestamp};

/// Row store for [`Race`] records.
#[async_trait]
pub trait RaceStore: Send + Sync {
    /// Insert a new draft race with `current_lap = 0`.
    async fn insert(&self, owner_id: &str, config: &RaceConfig) -> CoreResult<Race>;

    async fn find(&self, owner_id: &str, id: DbId) -> CoreResult<Option<Race>>;

    /// All races of `owner_id`, newest first.
    async fn list(&self, owner_id: &str) -> CoreResult<Vec<Race>>;

    /// Replace the configuration fields. Status and lap count are untouched.
    ///
    /// Returns `None` when no matching race exists.
    async fn update_config(
        &self,
        owner_id: &str,
        id: DbId,
        config: &RaceConfig,
    ) -> CoreResult<Option<Race>>;

    /// Delete a race. Returns the number of rows removed (0 or 1).
    async fn delete(&self, owner_id: &str, id: DbId) -> CoreResult<u64>;

    /// Set `status = active` and record the start time.
    ///
    /// Returns `false` when the race is missing or already completed.
    async fn mark_active(&self, owner_id: &str, id: DbId, started_at: Timestamp)
        -> CoreResult<bool>;

    /// Set `status = completed`. Returns `false` when the race is missing.
    async fn mark_completed(&self, owner_id: &str, id: DbId) -> CoreResult<bool>;

    /// Store the completed-lap count.
    ///
    /// Returns `false` when the race is missing or already completed.
    async fn record_lap(&self, owner_id: &str, id: DbId, current_lap: u32) -> CoreResult<bool>;

    /// Connectivity check used by `/health`.
    async fn ping(&self) -> CoreResult<()>;
}
