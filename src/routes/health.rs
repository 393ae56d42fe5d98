use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppResult;
use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    db: &'static str,
    queue: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}

/// Liveness probe: always 200 (§6).
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Readiness probe: 500 if any backing service is unreachable (ambient,
/// carried from the teacher's health route even though the spec's
/// functional surface only names `/health`).
async fn readiness_check(State(state): State<AppState>) -> AppResult<Json<ReadinessResponse>> {
    let db_ok = check_db(&state).await;
    let queue_ok = check_queue(&state).await;

    if !db_ok || !queue_ok {
        return Err(crate::error::AppError::Internal(
            "backing service unavailable".into(),
        ));
    }

    Ok(Json(ReadinessResponse {
        status: "ready",
        db: "connected",
        queue: "connected",
    }))
}

async fn check_db(state: &AppState) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok()
}

async fn check_queue(state: &AppState) -> bool {
    let mut conn = state.redis.clone();
    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .is_ok()
}
