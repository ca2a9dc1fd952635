use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};
use axum::extract::{Path, State};
use axum::Json;
use catalog_model::CacheRoot;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CreateCacheRootRequest {
    pub name: String,
    pub absolute_path: String,
    #[serde(default)]
    pub priority: i32,
    pub max_bytes: Option<u64>,
}

/// `POST /api/v1/cache-folders` — validates the candidate path, then
/// registers it.
pub async fn create_root(State(state): State<AppState>, Json(req): Json<CreateCacheRootRequest>) -> AppResult<Json<Value>> {
    let existing = state.store.list_cache_roots().await?;
    let validation = catalog_core::placement::validate_cache_root_path(&req.absolute_path, &existing).await;
    if !validation.valid {
        return Err(AppError::bad_request(format!(
            "cache root path invalid: exists={} writable={} is_directory={}",
            validation.exists, validation.writable, validation.is_directory
        )));
    }

    let root = CacheRoot {
        id: catalog_model::CacheRootId::new(),
        name: req.name,
        absolute_path: req.absolute_path,
        priority: req.priority,
        max_bytes: req.max_bytes,
        current_bytes: 0,
        file_count: 0,
        active: true,
        version: 0,
    };
    let root = state.store.create_cache_root(root).await?;
    Ok(Json(json!(root)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCacheRootRequest {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub max_bytes: Option<u64>,
    pub active: Option<bool>,
}

pub async fn update_root(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCacheRootRequest>,
) -> AppResult<Json<Value>> {
    let id = id.into();
    let mut root = state
        .store
        .get_cache_root(&id)
        .await?
        .ok_or_else(|| AppError::not_found("cache root not found"))?;

    if let Some(name) = req.name {
        root.name = name;
    }
    if let Some(priority) = req.priority {
        root.priority = priority;
    }
    if req.max_bytes.is_some() {
        root.max_bytes = req.max_bytes;
    }
    if let Some(active) = req.active {
        root.active = active;
    }

    state.store.update_cache_root(&root).await?;
    Ok(Json(json!(root)))
}

pub async fn delete_root(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let id = id.into();
    state.store.delete_cache_root(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ValidatePathRequest {
    pub path: String,
}

pub async fn validate_root(State(state): State<AppState>, Json(req): Json<ValidatePathRequest>) -> AppResult<Json<Value>> {
    let existing = state.store.list_cache_roots().await?;
    let validation = catalog_core::placement::validate_cache_root_path(&req.path, &existing).await;
    Ok(Json(json!(validation)))
}
