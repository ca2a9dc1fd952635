//! In-memory `CatalogStore`/`MessageBus` fakes for integration tests,
//! standing in for a real Postgres pool so the derivation/scan/scheduler
//! algorithms can be exercised without a database.

use async_trait::async_trait;
use catalog_contracts::bus::BusResult;
use catalog_contracts::{CatalogError, CatalogResult, CatalogStore, Delivery, MessageBus};
use catalog_model::{
    BackgroundJob, BackgroundJobId, CacheRoot, CacheRootId, Collection, CollectionId, Library,
    LibraryId, MessageId, MessageKind, Queue, ScheduledJob, ScheduledJobId, ScheduledJobRun,
    ScheduledJobRunId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryCatalogStore {
    libraries: Mutex<HashMap<LibraryId, Library>>,
    collections: Mutex<HashMap<CollectionId, Collection>>,
    cache_roots: Mutex<HashMap<CacheRootId, CacheRoot>>,
    background_jobs: Mutex<HashMap<BackgroundJobId, BackgroundJob>>,
    scheduled_jobs: Mutex<HashMap<ScheduledJobId, ScheduledJob>>,
    scheduled_job_runs: Mutex<HashMap<ScheduledJobRunId, ScheduledJobRun>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_library(&self, library: Library) {
        self.libraries.lock().unwrap().insert(library.id.clone(), library);
    }

    pub fn seed_collection(&self, collection: Collection) {
        self.collections.lock().unwrap().insert(collection.id.clone(), collection);
    }

    pub fn seed_cache_root(&self, root: CacheRoot) {
        self.cache_roots.lock().unwrap().insert(root.id.clone(), root);
    }

    pub fn seed_scheduled_job(&self, job: ScheduledJob) {
        self.scheduled_jobs.lock().unwrap().insert(job.id.clone(), job);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_library(&self, id: &LibraryId) -> CatalogResult<Option<Library>> {
        Ok(self.libraries.lock().unwrap().get(id).cloned())
    }

    async fn list_libraries(&self) -> CatalogResult<Vec<Library>> {
        Ok(self.libraries.lock().unwrap().values().cloned().collect())
    }

    async fn get_collection(&self, id: &CollectionId) -> CatalogResult<Option<Collection>> {
        Ok(self.collections.lock().unwrap().get(id).cloned())
    }

    async fn list_collections_for_library(&self, library_id: &LibraryId) -> CatalogResult<Vec<Collection>> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .values()
            .filter(|c| &c.library_id == library_id)
            .cloned()
            .collect())
    }

    async fn create_collection(&self, collection: Collection) -> CatalogResult<Collection> {
        self.collections.lock().unwrap().insert(collection.id.clone(), collection.clone());
        Ok(collection)
    }

    async fn save_collection(&self, collection: &Collection) -> CatalogResult<()> {
        self.collections.lock().unwrap().insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    async fn list_cache_roots(&self) -> CatalogResult<Vec<CacheRoot>> {
        Ok(self.cache_roots.lock().unwrap().values().cloned().collect())
    }

    async fn get_cache_root(&self, id: &CacheRootId) -> CatalogResult<Option<CacheRoot>> {
        Ok(self.cache_roots.lock().unwrap().get(id).cloned())
    }

    async fn create_cache_root(&self, root: CacheRoot) -> CatalogResult<CacheRoot> {
        self.cache_roots.lock().unwrap().insert(root.id.clone(), root.clone());
        Ok(root)
    }

    async fn update_cache_root(&self, root: &CacheRoot) -> CatalogResult<()> {
        self.cache_roots.lock().unwrap().insert(root.id.clone(), root.clone());
        Ok(())
    }

    async fn delete_cache_root(&self, id: &CacheRootId) -> CatalogResult<()> {
        self.cache_roots.lock().unwrap().remove(id);
        Ok(())
    }

    async fn cas_adjust_cache_root_usage(
        &self,
        id: &CacheRootId,
        expected_version: i64,
        delta_bytes: i64,
        delta_files: i64,
    ) -> CatalogResult<CacheRoot> {
        let mut roots = self.cache_roots.lock().unwrap();
        let root = roots.get_mut(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if root.version != expected_version {
            return Err(CatalogError::Conflict(id.to_string()));
        }
        root.current_bytes = (root.current_bytes as i64 + delta_bytes).max(0) as u64;
        root.file_count = (root.file_count as i64 + delta_files).max(0) as u64;
        root.version += 1;
        Ok(root.clone())
    }

    async fn create_background_job(&self, job: BackgroundJob) -> CatalogResult<BackgroundJob> {
        self.background_jobs.lock().unwrap().insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_background_job(&self, id: &BackgroundJobId) -> CatalogResult<Option<BackgroundJob>> {
        Ok(self.background_jobs.lock().unwrap().get(id).cloned())
    }

    async fn update_background_job(&self, job: &BackgroundJob) -> CatalogResult<()> {
        self.background_jobs.lock().unwrap().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn list_running_background_jobs(&self) -> CatalogResult<Vec<BackgroundJob>> {
        use catalog_model::BackgroundJobStatus;
        Ok(self
            .background_jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == BackgroundJobStatus::Running)
            .cloned()
            .collect())
    }

    async fn list_scheduled_jobs(&self) -> CatalogResult<Vec<ScheduledJob>> {
        Ok(self.scheduled_jobs.lock().unwrap().values().cloned().collect())
    }

    async fn get_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<Option<ScheduledJob>> {
        Ok(self.scheduled_jobs.lock().unwrap().get(id).cloned())
    }

    async fn create_scheduled_job(&self, job: ScheduledJob) -> CatalogResult<ScheduledJob> {
        self.scheduled_jobs.lock().unwrap().insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn set_scheduled_job_enabled(&self, id: &ScheduledJobId, enabled: bool) -> CatalogResult<()> {
        let mut jobs = self.scheduled_jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        job.enabled = enabled;
        Ok(())
    }

    async fn try_start_scheduled_job(
        &self,
        id: &ScheduledJobId,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ScheduledJob>> {
        let mut jobs = self.scheduled_jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if job.running || job.next_run_at.is_some_and(|t| t > now) {
            return Ok(None);
        }
        job.running = true;
        job.last_run_at = Some(now);
        job.run_count += 1;
        Ok(Some(job.clone()))
    }

    async fn finish_scheduled_job(
        &self,
        id: &ScheduledJobId,
        success: bool,
        next_run_at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let mut jobs = self.scheduled_jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        job.running = false;
        job.next_run_at = Some(next_run_at);
        if success {
            job.success_count += 1;
        } else {
            job.failure_count += 1;
        }
        Ok(())
    }

    async fn force_unlock_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<()> {
        let mut jobs = self.scheduled_jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        job.running = false;
        Ok(())
    }

    async fn create_scheduled_job_run(&self, run: ScheduledJobRun) -> CatalogResult<ScheduledJobRun> {
        self.scheduled_job_runs.lock().unwrap().insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn finish_scheduled_job_run(&self, run: &ScheduledJobRun) -> CatalogResult<()> {
        self.scheduled_job_runs.lock().unwrap().insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn list_scheduled_job_runs(
        &self,
        scheduled_job_id: &ScheduledJobId,
        limit: u32,
        offset: u32,
    ) -> CatalogResult<Vec<ScheduledJobRun>> {
        let mut runs: Vec<_> = self
            .scheduled_job_runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.scheduled_job_id == scheduled_job_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.started_at);
        Ok(runs.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn list_stuck_scheduled_job_runs(&self, older_than: DateTime<Utc>) -> CatalogResult<Vec<ScheduledJobRun>> {
        use catalog_model::RunStatus;
        Ok(self
            .scheduled_job_runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == RunStatus::Running && r.started_at < older_than)
            .cloned()
            .collect())
    }

    async fn get_scheduled_job_run(&self, id: &ScheduledJobRunId) -> CatalogResult<Option<ScheduledJobRun>> {
        Ok(self.scheduled_job_runs.lock().unwrap().get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMessageBus {
    queues: Mutex<HashMap<Queue, Vec<Delivery>>>,
    dlq: Mutex<HashMap<Queue, Vec<Delivery>>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self, queue: Queue) -> usize {
        self.queues.lock().unwrap().get(&queue).map(|v| v.len()).unwrap_or(0)
    }
}

fn queue_for(kind: MessageKind) -> Queue {
    match kind {
        MessageKind::CollectionScan => Queue::Scan,
        MessageKind::ThumbnailGeneration => Queue::Thumbnail,
        MessageKind::CacheGeneration => Queue::Cache,
        MessageKind::CollectionCreation => Queue::Creation,
        MessageKind::BulkOperation => Queue::Bulk,
        MessageKind::ImageProcessing => Queue::Processing,
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn setup(&self) -> BusResult<()> {
        Ok(())
    }

    async fn publish(
        &self,
        kind: MessageKind,
        correlation_id: Option<BackgroundJobId>,
        payload: serde_json::Value,
    ) -> BusResult<MessageId> {
        let queue = queue_for(kind);
        let delivery = Delivery {
            id: MessageId::new(),
            queue,
            kind,
            correlation_id,
            payload,
            attempts: 0,
            enqueued_at: Utc::now(),
        };
        let id = delivery.id.clone();
        self.queues.lock().unwrap().entry(queue).or_default().push(delivery);
        Ok(id)
    }

    async fn consume(&self, queue: Queue, max: u32) -> BusResult<Vec<Delivery>> {
        let mut queues = self.queues.lock().unwrap();
        let entries = queues.entry(queue).or_default();
        let take = (max as usize).min(entries.len());
        Ok(entries.drain(..take).collect())
    }

    async fn ack(&self, _id: &MessageId) -> BusResult<()> {
        Ok(())
    }

    async fn nack_requeue(&self, id: &MessageId) -> BusResult<()> {
        // Deliveries are already removed from the queue by `consume`; tests
        // that need requeue semantics re-publish explicitly.
        let _ = id;
        Ok(())
    }

    async fn nack_drop(&self, id: &MessageId) -> BusResult<()> {
        let _ = id;
        Ok(())
    }

    async fn dead_letters(&self, queue: Queue, limit: u32) -> BusResult<Vec<Delivery>> {
        Ok(self
            .dlq
            .lock()
            .unwrap()
            .get(&queue)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit as usize)
            .collect())
    }
}
