pub mod background_jobs;
pub mod cache_folders;
pub mod scheduled_jobs;
pub mod scans;

use crate::app_state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/libraries/{id}/scan", post(scans::scan_library))
        .route("/api/v1/collections/{id}/scan", post(scans::scan_collection))
        .route("/api/v1/background/jobs/{id}", get(background_jobs::get_job))
        .route("/api/v1/background/jobs/{id}/cancel", post(background_jobs::cancel_job))
        .route("/api/v1/scheduledjobs", get(scheduled_jobs::list_jobs))
        .route("/api/v1/scheduledjobs/{id}/enable", post(scheduled_jobs::enable_job))
        .route("/api/v1/scheduledjobs/{id}/disable", post(scheduled_jobs::disable_job))
        .route("/api/v1/scheduledjobs/{id}/runs", get(scheduled_jobs::list_runs))
        .route("/api/v1/cache-folders", post(cache_folders::create_root))
        .route("/api/v1/cache-folders/{id}", put(cache_folders::update_root))
        .route("/api/v1/cache-folders/{id}", delete(cache_folders::delete_root))
        .route("/api/v1/cache-folders/validate", post(cache_folders::validate_root))
        .with_state(state)
}
