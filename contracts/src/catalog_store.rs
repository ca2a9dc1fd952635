use crate::errors::CatalogError;
use async_trait::async_trait;
use catalog_model::{
    BackgroundJob, BackgroundJobId, CacheRoot, CacheRootId, Collection, CollectionId, Library,
    LibraryId, ScheduledJob, ScheduledJobId, ScheduledJobRun, ScheduledJobRunId,
};
use chrono::{DateTime, Utc};

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The durable source of truth. Implementations must give single-document
/// atomic updates for `Collection` writes and an optimistic compare-and-set
/// for `CacheRoot` byte/file accounting and for `ScheduledJob` status
/// transitions.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_library(&self, id: &LibraryId) -> CatalogResult<Option<Library>>;
    async fn list_libraries(&self) -> CatalogResult<Vec<Library>>;

    async fn get_collection(&self, id: &CollectionId) -> CatalogResult<Option<Collection>>;
    async fn list_collections_for_library(
        &self,
        library_id: &LibraryId,
    ) -> CatalogResult<Vec<Collection>>;
    async fn create_collection(&self, collection: Collection) -> CatalogResult<Collection>;
    /// Replaces the stored `Collection` document (including its embedded
    /// `images`) atomically.
    async fn save_collection(&self, collection: &Collection) -> CatalogResult<()>;

    async fn list_cache_roots(&self) -> CatalogResult<Vec<CacheRoot>>;
    async fn get_cache_root(&self, id: &CacheRootId) -> CatalogResult<Option<CacheRoot>>;
    async fn create_cache_root(&self, root: CacheRoot) -> CatalogResult<CacheRoot>;
    async fn update_cache_root(&self, root: &CacheRoot) -> CatalogResult<()>;
    async fn delete_cache_root(&self, id: &CacheRootId) -> CatalogResult<()>;
    /// Compare-and-set `currentBytes`/`fileCount` by the given deltas,
    /// retried by the caller on `CatalogError::Conflict`.
    async fn cas_adjust_cache_root_usage(
        &self,
        id: &CacheRootId,
        expected_version: i64,
        delta_bytes: i64,
        delta_files: i64,
    ) -> CatalogResult<CacheRoot>;

    async fn create_background_job(&self, job: BackgroundJob) -> CatalogResult<BackgroundJob>;
    async fn get_background_job(&self, id: &BackgroundJobId) -> CatalogResult<Option<BackgroundJob>>;
    async fn update_background_job(&self, job: &BackgroundJob) -> CatalogResult<()>;
    async fn list_running_background_jobs(&self) -> CatalogResult<Vec<BackgroundJob>>;

    async fn list_scheduled_jobs(&self) -> CatalogResult<Vec<ScheduledJob>>;
    async fn get_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<Option<ScheduledJob>>;
    async fn create_scheduled_job(&self, job: ScheduledJob) -> CatalogResult<ScheduledJob>;
    async fn set_scheduled_job_enabled(&self, id: &ScheduledJobId, enabled: bool) -> CatalogResult<()>;
    /// Atomically transitions an idle, due job to `running`. Returns `None`
    /// if another process already won the race or the job isn't due.
    async fn try_start_scheduled_job(
        &self,
        id: &ScheduledJobId,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ScheduledJob>>;
    async fn finish_scheduled_job(
        &self,
        id: &ScheduledJobId,
        success: bool,
        next_run_at: DateTime<Utc>,
    ) -> CatalogResult<()>;
    /// Forces a job stuck in `running` back to idle (Job Monitor, on a
    /// timed-out `ScheduledJobRun`).
    async fn force_unlock_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<()>;

    async fn create_scheduled_job_run(&self, run: ScheduledJobRun) -> CatalogResult<ScheduledJobRun>;
    async fn finish_scheduled_job_run(&self, run: &ScheduledJobRun) -> CatalogResult<()>;
    async fn list_scheduled_job_runs(
        &self,
        scheduled_job_id: &ScheduledJobId,
        limit: u32,
        offset: u32,
    ) -> CatalogResult<Vec<ScheduledJobRun>>;
    async fn list_stuck_scheduled_job_runs(
        &self,
        older_than: DateTime<Utc>,
    ) -> CatalogResult<Vec<ScheduledJobRun>>;
    async fn get_scheduled_job_run(
        &self,
        id: &ScheduledJobRunId,
    ) -> CatalogResult<Option<ScheduledJobRun>>;
}
