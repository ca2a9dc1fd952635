use crate::app_state::AppState;
use crate::errors::AppResult;
use axum::extract::{Path, State};
use axum::Json;
use catalog_model::{BackgroundJob, CollectionScanMessage, MessageKind};
use serde_json::{json, Value};

/// `POST /api/v1/libraries/{id}/scan` — enqueues one `CollectionScanMessage`
/// per non-deleted collection in the library, behind a single parent
/// `BackgroundJob`.
pub async fn scan_library(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let library_id = id.into();
    let collections = state.store.list_collections_for_library(&library_id).await?;
    let collections: Vec<_> = collections.into_iter().filter(|c| !c.is_deleted).collect();

    let mut job = BackgroundJob::new("library.scan", collections.len() as u64);
    job.start(chrono::Utc::now());
    let job = state.store.create_background_job(job).await?;

    for collection in &collections {
        let msg = CollectionScanMessage {
            collection_id: collection.id.clone(),
            path: collection.path.clone(),
            kind: collection.kind,
            force_rescan: false,
        };
        state
            .bus
            .publish(MessageKind::CollectionScan, Some(job.id.clone()), serde_json::to_value(&msg)?)
            .await?;
    }

    Ok(Json(json!({ "jobId": job.id, "collections": collections.len() })))
}

/// `POST /api/v1/collections/{id}/scan` — enqueues a single
/// `CollectionScanMessage`, returning the parent `BackgroundJob` id.
pub async fn scan_collection(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let collection_id = id.into();
    let collection = state
        .store
        .get_collection(&collection_id)
        .await?
        .ok_or_else(|| crate::errors::AppError::not_found(format!("collection {collection_id} not found")))?;

    let mut job = BackgroundJob::new("collection.scan", 1);
    job.start(chrono::Utc::now());
    let job = state.store.create_background_job(job).await?;

    let msg = CollectionScanMessage {
        collection_id: collection.id,
        path: collection.path,
        kind: collection.kind,
        force_rescan: false,
    };
    state
        .bus
        .publish(MessageKind::CollectionScan, Some(job.id.clone()), serde_json::to_value(&msg)?)
        .await?;

    Ok(Json(json!({ "jobId": job.id })))
}
