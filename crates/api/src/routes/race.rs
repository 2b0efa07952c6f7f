//! Route definitions for the `/races` resource and its timer.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{race, timer};
use crate::state::AppState;

/// Routes mounted at `/races`.
///
/// ```text
/// GET    /                -> list
/// POST   /                -> create
/// GET    /{id}            -> get_by_id
/// PATCH  /{id}            -> update
/// PUT    /{id}            -> update
/// DELETE /{id}            -> delete
///
/// POST   /{id}/timer      -> load
/// GET    /{id}/timer      -> snapshot
/// DELETE /{id}/timer      -> teardown
/// POST   /{id}/start      -> start
/// POST   /{id}/stop       -> stop
/// POST   /{id}/laps       -> complete_lap
/// GET    /{id}/results    -> results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(race::list).post(race::create))
        .route(
            "/{id}",
            get(race::get_by_id)
                .patch(race::update)
                .put(race::update)
                .delete(race::delete),
        )
        .route(
            "/{id}/timer",
            post(timer::load).get(timer::snapshot).delete(timer::teardown),
        )
        .route("/{id}/start", post(timer::start))
        .route("/{id}/stop", post(timer::stop))
        .route("/{id}/laps", post(timer::complete_lap))
        .route("/{id}/results", get(timer::results))
}
