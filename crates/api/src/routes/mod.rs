pub mod health;
pub mod race;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /races                       list, create
/// /races/{id}                  get, update (PATCH/PUT), delete
/// /races/{id}/timer            load, snapshot, teardown
/// /races/{id}/start            start the race
/// /races/{id}/stop             stop the race (confirmation required)
/// /races/{id}/laps             record a lap manually
/// /races/{id}/results          results summary
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/races", race::router())
}
