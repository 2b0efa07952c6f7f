//! Handlers for the `/races` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lapwatch_core::race::Race;
use lapwatch_core::race_config::RaceInput;
use lapwatch_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/races
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<RaceInput>,
) -> AppResult<(StatusCode, Json<DataResponse<Race>>)> {
    let race = state.races.create_race(&auth.owner_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: race })))
}

/// GET /api/v1/races
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Race>>>> {
    let races = state.races.list_races(&auth.owner_id).await?;
    Ok(Json(DataResponse { data: races }))
}

/// GET /api/v1/races/{id}
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Race>>> {
    let race = state.races.get_race(&auth.owner_id, id).await?;
    Ok(Json(DataResponse { data: race }))
}

/// PATCH /api/v1/races/{id} (PUT is accepted too)
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RaceInput>,
) -> AppResult<Json<DataResponse<Race>>> {
    let race = state.races.update_race(&auth.owner_id, id, &input).await?;
    Ok(Json(DataResponse { data: race }))
}

/// DELETE /api/v1/races/{id}
pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.races.delete_race(&auth.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
