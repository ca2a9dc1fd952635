use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};
use axum::extract::{Path, State};
use axum::Json;
use catalog_model::BackgroundJobStatus;
use serde_json::{json, Value};

/// `GET /api/v1/background/jobs/{id}` — `{status, done, total, failed, lastError?}`.
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let job = state
        .store
        .get_background_job(&id.into())
        .await?
        .ok_or_else(|| AppError::not_found("background job not found"))?;

    Ok(Json(json!({
        "id": job.id,
        "status": job.status,
        "done": job.done,
        "total": job.total,
        "failed": job.failed,
        "lastError": job.last_error,
        "startedAt": job.started_at,
        "completedAt": job.completed_at,
    })))
}

/// `POST /api/v1/background/jobs/{id}/cancel` — best-effort: marks the job
/// `Cancelled` if it hasn't already reached a terminal state. In-flight
/// derivations finish their current artifact rather than being interrupted
/// mid-write.
pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let mut job = state
        .store
        .get_background_job(&id.into())
        .await?
        .ok_or_else(|| AppError::not_found("background job not found"))?;

    if job.is_terminal() {
        return Ok(Json(json!({ "id": job.id, "status": job.status })));
    }

    job.status = BackgroundJobStatus::Cancelled;
    job.completed_at = Some(chrono::Utc::now());
    state.store.update_background_job(&job).await?;

    Ok(Json(json!({ "id": job.id, "status": job.status })))
}
