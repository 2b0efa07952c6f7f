//! Integration tests for the race timer and results endpoints.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{backyard_body, body_json, build_test_app, frontyard_body, TestApp, OTHER_OWNER};
use lapwatch_core::race::RaceStatus;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

async fn create(app: &TestApp, body: Value) -> i64 {
    app.create_race(body).await["id"].as_i64().unwrap()
}

async fn snapshot_of(response: axum::response::Response) -> Value {
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Load / snapshot / teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timer_must_be_loaded_before_snapshot() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Idle")).await;
    let uri = format!("/api/v1/races/{id}/timer");

    assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);

    let response = app.post(&uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = snapshot_of(response).await;
    assert_eq!(snapshot["phase"], "idle");
    assert_eq!(snapshot["countdown_seconds"], 3600);
    assert_eq!(snapshot["countdown_display"], "1:00:00");
    assert_eq!(snapshot["lap_number"], 1);

    let response = app.get(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(snapshot_of(response).await["phase"], "idle");
}

#[tokio::test]
async fn teardown_unloads_timer() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Unload")).await;
    let uri = format!("/api/v1/races/{id}/timer");

    app.post(&uri, None).await;
    assert_eq!(app.delete(&uri).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);
    // Tearing down an unloaded timer is fine too.
    assert_eq!(app.delete(&uri).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn foreign_timer_is_not_found() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Private")).await;

    for (method, path) in [
        (Method::POST, "timer"),
        (Method::POST, "start"),
        (Method::POST, "laps"),
        (Method::GET, "results"),
    ] {
        let uri = format!("/api/v1/races/{id}/{path}");
        let response = app.send(method, &uri, Some(OTHER_OWNER), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
    assert_eq!(app.state.clocks.loaded_count().await, 0);
}

// ---------------------------------------------------------------------------
// Start / laps / stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_runs_race_and_persists_active() {
    let app = build_test_app();
    let id = create(&app, frontyard_body("Go")).await;

    let response = app.post(&format!("/api/v1/races/{id}/start"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = snapshot_of(response).await;
    assert_eq!(snapshot["phase"], "running");
    assert_eq!(snapshot["countdown_seconds"], 300);
    assert_eq!(snapshot["countdown_display"], "5:00");

    let stored = app.store.peek(id).await.unwrap();
    assert_eq!(stored.status, RaceStatus::Active);
    assert_eq!(stored.scheduled_start_at, Some(common::t0()));

    // Starting again is a no-op.
    let response = app.post(&format!("/api/v1/races/{id}/start"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn manual_laps_shrink_frontyard_interval() {
    let app = build_test_app();
    let id = create(&app, frontyard_body("Shrink")).await;
    let laps = format!("/api/v1/races/{id}/laps");

    let response = app.post(&laps, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.post(&format!("/api/v1/races/{id}/start"), None).await;
    let mut snapshot = Value::Null;
    for _ in 0..2 {
        let response = app.post(&laps, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        snapshot = snapshot_of(response).await;
    }
    assert_eq!(snapshot["completed_laps"], 2);
    assert_eq!(snapshot["lap_number"], 3);
    assert_eq!(snapshot["effective_interval_seconds"], 180);
    assert_eq!(snapshot["distance_meters"], 2000);
    assert_eq!(snapshot["distance_display"], "2.0 km");

    // Lap writes are queued; wait for them to land.
    for _ in 0..100 {
        if app.store.peek(id).await.unwrap().current_lap == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(app.store.peek(id).await.unwrap().current_lap, 2);
}

#[tokio::test]
async fn stop_requires_confirmation() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Stop")).await;
    let stop = format!("/api/v1/races/{id}/stop");
    app.post(&format!("/api/v1/races/{id}/start"), None).await;

    let response = app.post(&stop, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = app.post(&stop, Some(json!({ "confirm": true }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(snapshot_of(response).await["phase"], "completed");
    assert_eq!(
        app.store.peek(id).await.unwrap().status,
        RaceStatus::Completed
    );
    // A finished race releases its timer.
    assert_eq!(app.state.clocks.loaded_count().await, 0);

    // Stopping a completed race is a no-op, restarting it is not allowed.
    let response = app.post(&stop, Some(json!({ "confirm": true }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.post(&format!("/api/v1/races/{id}/start"), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stop_before_start_conflicts() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Early")).await;
    let response = app
        .post(
            &format!("/api/v1/races/{id}/stop"),
            Some(json!({ "confirm": true })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn scheduled_race_cannot_be_started_manually() {
    let app = build_test_app();
    let mut body = backyard_body("Later");
    body["scheduled_start"] = json!("2025-04-26T08:00:00Z");
    let id = create(&app, body).await;

    let response = app.post(&format!("/api/v1/races/{id}/timer"), None).await;
    let snapshot = snapshot_of(response).await;
    assert_eq!(snapshot["phase"], "awaiting_schedule");
    assert_eq!(snapshot["countdown_seconds"], 3600);

    let response = app.post(&format!("/api/v1/races/{id}/start"), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn overdue_schedule_starts_on_load() {
    let app = build_test_app();
    let mut body = backyard_body("Overdue");
    body["scheduled_start"] = json!("2025-04-26T06:59:00Z");
    let id = create(&app, body).await;

    let response = app.post(&format!("/api/v1/races/{id}/timer"), None).await;
    let snapshot = snapshot_of(response).await;
    assert_eq!(snapshot["phase"], "running");
    assert_eq!(snapshot["countdown_seconds"], 3600);
}

#[tokio::test]
async fn failed_start_write_returns_500_and_keeps_race_idle() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Outage")).await;
    app.store.fail_writes(true);

    let response = app.post(&format!("/api/v1/races/{id}/start"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PERSISTENCE_ERROR");

    let response = app.get(&format!("/api/v1/races/{id}/timer")).await;
    assert_eq!(snapshot_of(response).await["phase"], "idle");
}

#[tokio::test]
async fn failed_lap_write_is_counted_by_health() {
    let app = build_test_app();
    let cancel = CancellationToken::new();
    let monitor = app.state.spawn_write_monitor(cancel.clone());

    let id = create(&app, backyard_body("Flaky")).await;
    app.post(&format!("/api/v1/races/{id}/start"), None).await;
    app.store.fail_writes(true);

    let response = app.post(&format!("/api/v1/races/{id}/laps"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(snapshot_of(response).await["completed_laps"], 1);

    let mut failures = 0;
    for _ in 0..100 {
        let health = body_json(app.send(Method::GET, "/health", None, None).await).await;
        failures = health["write_failures"].as_u64().unwrap();
        if failures == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(failures, 1);
    assert_eq!(app.store.peek(id).await.unwrap().current_lap, 0);

    cancel.cancel();
    monitor.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rescheduling_loaded_race_moves_its_start() {
    let app = build_test_app();
    let mut body = backyard_body("Moved");
    body["scheduled_start"] = json!("2025-04-26T07:00:10Z");
    let id = create(&app, body.clone()).await;
    app.post(&format!("/api/v1/races/{id}/timer"), None).await;

    body["scheduled_start"] = json!("2025-04-26T08:00:00Z");
    let response = app.patch(&format!("/api/v1/races/{id}"), body).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.clock.advance(chrono::Duration::seconds(15));
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stored = app.store.peek(id).await.unwrap();
    assert_eq!(stored.status, RaceStatus::Draft);
    assert_eq!(stored.scheduled_start_at, Some(common::t0() + chrono::Duration::hours(1)));

    let response = app.get(&format!("/api/v1/races/{id}/timer")).await;
    let snapshot = snapshot_of(response).await;
    assert_eq!(snapshot["phase"], "awaiting_schedule");
    assert_eq!(snapshot["countdown_seconds"], 3600 - 15);
}

#[tokio::test]
async fn renaming_running_race_keeps_its_start() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Before")).await;
    app.post(&format!("/api/v1/races/{id}/start"), None).await;

    let response = app
        .patch(&format!("/api/v1/races/{id}"), backyard_body("After"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let race = body_json(response).await["data"].clone();
    assert_eq!(race["name"], "After");
    assert_eq!(race["status"], "active");
    assert_eq!(race["scheduled_start_at"], "2025-04-26T07:00:00Z");

    app.clock.advance(chrono::Duration::seconds(90));
    let response = app.get(&format!("/api/v1/races/{id}/results")).await;
    assert_eq!(snapshot_of(response).await["elapsed_display"], "0:01:30");
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_minute_interval_round_trips_to_results() {
    let app = build_test_app();
    let mut body = backyard_body("Short");
    body["base_interval_minutes"] = json!(5);
    let id = create(&app, body).await;

    let race = body_json(app.get(&format!("/api/v1/races/{id}")).await).await;
    assert_eq!(race["data"]["base_interval_seconds"], 300);

    let response = app.get(&format!("/api/v1/races/{id}/results")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = snapshot_of(response).await;
    assert_eq!(results["interval_display"], "5 minuter");
    assert_eq!(results["status"], "draft");
    assert_eq!(results["completed_laps"], 0);
    assert_eq!(results["elapsed_display"], "0:00:00");
}

#[tokio::test]
async fn results_summarize_stored_race() {
    let app = build_test_app();
    let id = create(&app, backyard_body("Results")).await;
    app.post(&format!("/api/v1/races/{id}/start"), None).await;
    app.post(&format!("/api/v1/races/{id}/laps"), None).await;
    app.post(&format!("/api/v1/races/{id}/laps"), None).await;
    app.post(
        &format!("/api/v1/races/{id}/stop"),
        Some(json!({ "confirm": true })),
    )
    .await;
    app.clock.advance(chrono::Duration::seconds(2 * 3600 + 5));

    let response = app.get(&format!("/api/v1/races/{id}/results")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = snapshot_of(response).await;
    assert_eq!(results["status"], "completed");
    assert_eq!(results["completed_laps"], 2);
    assert_eq!(results["distance_display"], "13.41 km");
    assert_eq!(results["elapsed_display"], "2:00:05");
    assert_eq!(results["interval_display"], "60 minuter");
    assert!(results["lap_reduction_display"].is_null());
}
