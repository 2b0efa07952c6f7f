//! Handlers for the race timer and results under `/races/{id}`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lapwatch_core::race_timer::TimerSnapshot;
use lapwatch_core::results::RaceResults;
use lapwatch_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /races/{id}/stop`.
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    /// Stopping is irreversible and must be confirmed explicitly.
    #[serde(default)]
    pub confirm: bool,
}

type SnapshotResponse = AppResult<Json<DataResponse<TimerSnapshot>>>;

/// POST /api/v1/races/{id}/timer
pub async fn load(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> SnapshotResponse {
    let snapshot = state.clocks.load(&auth.owner_id, id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/races/{id}/timer
pub async fn snapshot(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> SnapshotResponse {
    let snapshot = state.clocks.snapshot(&auth.owner_id, id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// DELETE /api/v1/races/{id}/timer
pub async fn teardown(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> StatusCode {
    state.clocks.teardown(&auth.owner_id, id).await;
    StatusCode::NO_CONTENT
}

/// POST /api/v1/races/{id}/start
pub async fn start(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> SnapshotResponse {
    let snapshot = state.clocks.start(&auth.owner_id, id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/races/{id}/stop
pub async fn stop(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<StopRequest>,
) -> SnapshotResponse {
    let snapshot = state.clocks.stop(&auth.owner_id, id, body.confirm).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/races/{id}/laps
pub async fn complete_lap(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> SnapshotResponse {
    let snapshot = state.clocks.complete_lap(&auth.owner_id, id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/races/{id}/results
pub async fn results(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RaceResults>>> {
    let race = state.races.get_race(&auth.owner_id, id).await?;
    let results = RaceResults::summarize(&race, state.clock.now());
    Ok(Json(DataResponse { data: results }))
}
