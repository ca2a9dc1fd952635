use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn list_jobs(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let jobs = state.store.list_scheduled_jobs().await?;
    Ok(Json(json!({ "jobs": jobs })))
}

pub async fn enable_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    state.store.set_scheduled_job_enabled(&id.clone().into(), true).await?;
    Ok(Json(json!({ "id": id, "enabled": true })))
}

pub async fn disable_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    state.store.set_scheduled_job_enabled(&id.clone().into(), false).await?;
    Ok(Json(json!({ "id": id, "enabled": false })))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RunsQuery>,
) -> AppResult<Json<Value>> {
    let scheduled_job_id = id.into();
    state
        .store
        .get_scheduled_job(&scheduled_job_id)
        .await?
        .ok_or_else(|| AppError::not_found("scheduled job not found"))?;

    let runs = state
        .store
        .list_scheduled_job_runs(&scheduled_job_id, query.limit, query.offset)
        .await?;
    Ok(Json(json!({ "runs": runs, "limit": query.limit, "offset": query.offset })))
}
