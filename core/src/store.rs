//! Postgres-backed `CatalogStore`. Libraries, collections, cache roots,
//! background jobs, and scheduled jobs each get their own table;
//! `Collection.images` is stored as a JSONB document, with rows that grow
//! past [`catalog_model::MAX_EMBEDDED_IMAGES`] spilled into a child table
//! so the public `Collection` type never has to change shape.

use async_trait::async_trait;
use catalog_contracts::{CatalogError, CatalogResult, CatalogStore};
use catalog_model::{
    BackgroundJob, BackgroundJobId, CacheRoot, CacheRootId, Collection, CollectionId, Image,
    Library, LibraryId, ScheduledJob, ScheduledJobId, ScheduledJobRun, ScheduledJobRunId,
    MAX_EMBEDDED_IMAGES,
};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates tables if absent. Idempotent; safe to call on every start.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn load_images(&self, collection_id: &CollectionId, embedded: Vec<Image>) -> CatalogResult<Vec<Image>> {
        let overflow_count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM collection_images WHERE collection_id = $1",
        )
        .bind(collection_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;

        if overflow_count == 0 {
            return Ok(embedded);
        }

        let rows = sqlx::query("SELECT data FROM collection_images WHERE collection_id = $1 ORDER BY ordinal")
            .bind(collection_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;

        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn save_images(&self, collection_id: &CollectionId, images: &[Image]) -> CatalogResult<Vec<Image>> {
        sqlx::query("DELETE FROM collection_images WHERE collection_id = $1")
            .bind(collection_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;

        if images.len() <= MAX_EMBEDDED_IMAGES {
            return Ok(images.to_vec());
        }

        for (ordinal, image) in images.iter().enumerate() {
            let data = serde_json::to_value(image).map_err(|e| CatalogError::Storage(e.into()))?;
            sqlx::query(
                "INSERT INTO collection_images (collection_id, ordinal, data) VALUES ($1, $2, $3)",
            )
            .bind(collection_id.as_str())
            .bind(ordinal as i64)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        }

        Ok(Vec::new())
    }

    fn row_to_collection(row_images: serde_json::Value, row: &sqlx::postgres::PgRow) -> CatalogResult<Collection> {
        let embedded: Vec<Image> =
            serde_json::from_value(row_images).map_err(|e| CatalogError::Storage(e.into()))?;
        let settings: serde_json::Value = row.try_get("settings").map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(Collection {
            id: row.try_get::<String, _>("id").map_err(|e| CatalogError::Storage(e.into()))?.into(),
            library_id: row
                .try_get::<String, _>("library_id")
                .map_err(|e| CatalogError::Storage(e.into()))?
                .into(),
            name: row.try_get("name").map_err(|e| CatalogError::Storage(e.into()))?,
            path: row.try_get("path").map_err(|e| CatalogError::Storage(e.into()))?,
            kind: serde_json::from_value(row.try_get::<serde_json::Value, _>("kind").map_err(|e| CatalogError::Storage(e.into()))?)
                .map_err(|e| CatalogError::Storage(e.into()))?,
            settings: serde_json::from_value(settings).map_err(|e| CatalogError::Storage(e.into()))?,
            images: embedded,
            stats: serde_json::from_value(row.try_get::<serde_json::Value, _>("stats").map_err(|e| CatalogError::Storage(e.into()))?)
                .map_err(|e| CatalogError::Storage(e.into()))?,
            is_deleted: row.try_get("is_deleted").map_err(|e| CatalogError::Storage(e.into()))?,
            scan_error: row.try_get("scan_error").map_err(|e| CatalogError::Storage(e.into()))?,
            created_at: row.try_get("created_at").map_err(|e| CatalogError::Storage(e.into()))?,
        })
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_library(&self, id: &LibraryId) -> CatalogResult<Option<Library>> {
        let row = sqlx::query("SELECT data FROM libraries WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                Ok(Some(serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))?))
            }
        }
    }

    async fn list_libraries(&self) -> CatalogResult<Vec<Library>> {
        let rows = sqlx::query("SELECT data FROM libraries WHERE NOT (data->>'is_deleted')::boolean ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn get_collection(&self, id: &CollectionId) -> CatalogResult<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, library_id, name, path, kind, settings, images, stats, is_deleted, scan_error, created_at \
             FROM collections WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;

        let Some(row) = row else { return Ok(None) };
        let images_json: serde_json::Value = row.try_get("images").map_err(|e| CatalogError::Storage(e.into()))?;
        let mut collection = Self::row_to_collection(images_json, &row)?;
        collection.images = self.load_images(id, collection.images).await?;
        Ok(Some(collection))
    }

    async fn list_collections_for_library(&self, library_id: &LibraryId) -> CatalogResult<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT id, library_id, name, path, kind, settings, images, stats, is_deleted, scan_error, created_at \
             FROM collections WHERE library_id = $1 ORDER BY id",
        )
        .bind(library_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let images_json: serde_json::Value = row.try_get("images").map_err(|e| CatalogError::Storage(e.into()))?;
            let id_str: String = row.try_get("id").map_err(|e| CatalogError::Storage(e.into()))?;
            let mut collection = Self::row_to_collection(images_json, &row)?;
            collection.images = self.load_images(&id_str.clone().into(), collection.images).await?;
            out.push(collection);
        }
        Ok(out)
    }

    async fn create_collection(&self, collection: Collection) -> CatalogResult<Collection> {
        self.save_collection(&collection).await?;
        Ok(collection)
    }

    async fn save_collection(&self, collection: &Collection) -> CatalogResult<()> {
        let embedded = self.save_images(&collection.id, &collection.images).await?;
        let kind = serde_json::to_value(&collection.kind).map_err(|e| CatalogError::Storage(e.into()))?;
        let settings = serde_json::to_value(&collection.settings).map_err(|e| CatalogError::Storage(e.into()))?;
        let stats = serde_json::to_value(&collection.stats).map_err(|e| CatalogError::Storage(e.into()))?;
        let images = serde_json::to_value(&embedded).map_err(|e| CatalogError::Storage(e.into()))?;

        sqlx::query(
            "INSERT INTO collections (id, library_id, name, path, kind, settings, images, stats, is_deleted, scan_error, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11) \
             ON CONFLICT (id) DO UPDATE SET \
               name = excluded.name, path = excluded.path, kind = excluded.kind, settings = excluded.settings, \
               images = excluded.images, stats = excluded.stats, is_deleted = excluded.is_deleted, \
               scan_error = excluded.scan_error",
        )
        .bind(collection.id.as_str())
        .bind(collection.library_id.as_str())
        .bind(&collection.name)
        .bind(&collection.path)
        .bind(kind)
        .bind(settings)
        .bind(images)
        .bind(stats)
        .bind(collection.is_deleted)
        .bind(&collection.scan_error)
        .bind(collection.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn list_cache_roots(&self) -> CatalogResult<Vec<CacheRoot>> {
        let rows = sqlx::query("SELECT data FROM cache_roots ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn get_cache_root(&self, id: &CacheRootId) -> CatalogResult<Option<CacheRoot>> {
        let row = sqlx::query("SELECT data FROM cache_roots WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                Ok(Some(serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))?))
            }
        }
    }

    async fn create_cache_root(&self, root: CacheRoot) -> CatalogResult<CacheRoot> {
        let data = serde_json::to_value(&root).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("INSERT INTO cache_roots (id, version, data) VALUES ($1, $2, $3)")
            .bind(root.id.as_str())
            .bind(root.version)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(root)
    }

    async fn update_cache_root(&self, root: &CacheRoot) -> CatalogResult<()> {
        let data = serde_json::to_value(root).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE cache_roots SET data = $2, version = $3 WHERE id = $1")
            .bind(root.id.as_str())
            .bind(data)
            .bind(root.version)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn delete_cache_root(&self, id: &CacheRootId) -> CatalogResult<()> {
        sqlx::query("DELETE FROM cache_roots WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn cas_adjust_cache_root_usage(
        &self,
        id: &CacheRootId,
        expected_version: i64,
        delta_bytes: i64,
        delta_files: i64,
    ) -> CatalogResult<CacheRoot> {
        let mut root = self
            .get_cache_root(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.as_str().to_string()))?;
        if root.version != expected_version {
            return Err(CatalogError::Conflict(format!(
                "cache root {id} version mismatch: expected {expected_version}, found {}",
                root.version
            )));
        }
        root.current_bytes = (root.current_bytes as i64 + delta_bytes).max(0) as u64;
        root.file_count = (root.file_count as i64 + delta_files).max(0) as u64;

        let data = serde_json::to_value(&root).map_err(|e| CatalogError::Storage(e.into()))?;
        let result = sqlx::query(
            "UPDATE cache_roots SET data = $1, version = version + 1 WHERE id = $2 AND version = $3",
        )
        .bind(data)
        .bind(id.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::Conflict(format!("cache root {id} updated concurrently")));
        }
        root.version = expected_version + 1;
        Ok(root)
    }

    async fn create_background_job(&self, job: BackgroundJob) -> CatalogResult<BackgroundJob> {
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("INSERT INTO background_jobs (id, status, data) VALUES ($1, $2, $3)")
            .bind(job.id.as_str())
            .bind(format!("{:?}", job.status))
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(job)
    }

    async fn get_background_job(&self, id: &BackgroundJobId) -> CatalogResult<Option<BackgroundJob>> {
        let row = sqlx::query("SELECT data FROM background_jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                Ok(Some(serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))?))
            }
        }
    }

    async fn update_background_job(&self, job: &BackgroundJob) -> CatalogResult<()> {
        let data = serde_json::to_value(job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE background_jobs SET data = $2, status = $3 WHERE id = $1")
            .bind(job.id.as_str())
            .bind(data)
            .bind(format!("{:?}", job.status))
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn list_running_background_jobs(&self) -> CatalogResult<Vec<BackgroundJob>> {
        let rows = sqlx::query("SELECT data FROM background_jobs WHERE status = 'Running' ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn list_scheduled_jobs(&self) -> CatalogResult<Vec<ScheduledJob>> {
        let rows = sqlx::query("SELECT data FROM scheduled_jobs ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn get_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<Option<ScheduledJob>> {
        let row = sqlx::query("SELECT data FROM scheduled_jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                Ok(Some(serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))?))
            }
        }
    }

    async fn create_scheduled_job(&self, job: ScheduledJob) -> CatalogResult<ScheduledJob> {
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("INSERT INTO scheduled_jobs (id, data) VALUES ($1, $2)")
            .bind(job.id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(job)
    }

    async fn set_scheduled_job_enabled(&self, id: &ScheduledJobId, enabled: bool) -> CatalogResult<()> {
        let mut job = self
            .get_scheduled_job(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.as_str().to_string()))?;
        job.enabled = enabled;
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE scheduled_jobs SET data = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn try_start_scheduled_job(
        &self,
        id: &ScheduledJobId,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ScheduledJob>> {
        let mut job = match self.get_scheduled_job(id).await? {
            Some(job) => job,
            None => return Ok(None),
        };
        if !job.enabled || job.running || job.next_run_at.is_some_and(|t| t > now) {
            return Ok(None);
        }
        job.running = true;
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET data = $1 \
             WHERE id = $2 AND (data->>'running')::boolean = false",
        )
        .bind(data)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(job))
    }

    async fn finish_scheduled_job(
        &self,
        id: &ScheduledJobId,
        success: bool,
        next_run_at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let mut job = self
            .get_scheduled_job(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.as_str().to_string()))?;
        job.running = false;
        job.last_run_at = Some(Utc::now());
        job.next_run_at = Some(next_run_at);
        job.run_count += 1;
        if success {
            job.success_count += 1;
        } else {
            job.failure_count += 1;
        }
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE scheduled_jobs SET data = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn force_unlock_scheduled_job(&self, id: &ScheduledJobId) -> CatalogResult<()> {
        let mut job = self
            .get_scheduled_job(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.as_str().to_string()))?;
        job.running = false;
        let data = serde_json::to_value(&job).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE scheduled_jobs SET data = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn create_scheduled_job_run(&self, run: ScheduledJobRun) -> CatalogResult<ScheduledJobRun> {
        let data = serde_json::to_value(&run).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query(
            "INSERT INTO scheduled_job_runs (id, scheduled_job_id, status, started_at, data) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(run.id.as_str())
        .bind(run.scheduled_job_id.as_str())
        .bind(format!("{:?}", run.status))
        .bind(run.started_at)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(run)
    }

    async fn finish_scheduled_job_run(&self, run: &ScheduledJobRun) -> CatalogResult<()> {
        let data = serde_json::to_value(run).map_err(|e| CatalogError::Storage(e.into()))?;
        sqlx::query("UPDATE scheduled_job_runs SET data = $2, status = $3 WHERE id = $1")
            .bind(run.id.as_str())
            .bind(data)
            .bind(format!("{:?}", run.status))
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        Ok(())
    }

    async fn list_scheduled_job_runs(
        &self,
        scheduled_job_id: &ScheduledJobId,
        limit: u32,
        offset: u32,
    ) -> CatalogResult<Vec<ScheduledJobRun>> {
        let rows = sqlx::query(
            "SELECT data FROM scheduled_job_runs WHERE scheduled_job_id = $1 \
             ORDER BY started_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(scheduled_job_id.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn list_stuck_scheduled_job_runs(&self, older_than: DateTime<Utc>) -> CatalogResult<Vec<ScheduledJobRun>> {
        let rows = sqlx::query(
            "SELECT data FROM scheduled_job_runs WHERE status = 'Running' AND started_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.into()))?;
        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))
            })
            .collect()
    }

    async fn get_scheduled_job_run(&self, id: &ScheduledJobRunId) -> CatalogResult<Option<ScheduledJobRun>> {
        let row = sqlx::query("SELECT data FROM scheduled_job_runs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.into()))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: serde_json::Value = row.try_get("data").map_err(|e| CatalogError::Storage(e.into()))?;
                Ok(Some(serde_json::from_value(value).map_err(|e| CatalogError::Storage(e.into()))?))
            }
        }
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS libraries (
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    library_id TEXT NOT NULL,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    kind JSONB NOT NULL,
    settings JSONB NOT NULL,
    images JSONB NOT NULL,
    stats JSONB NOT NULL,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    scan_error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS collections_library_id_idx ON collections (library_id);

CREATE TABLE IF NOT EXISTS collection_images (
    collection_id TEXT NOT NULL,
    ordinal BIGINT NOT NULL,
    data JSONB NOT NULL,
    PRIMARY KEY (collection_id, ordinal)
);

CREATE TABLE IF NOT EXISTS cache_roots (
    id TEXT PRIMARY KEY,
    version BIGINT NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS background_jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS background_jobs_status_idx ON background_jobs (status);

CREATE TABLE IF NOT EXISTS scheduled_jobs (
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS scheduled_job_runs (
    id TEXT PRIMARY KEY,
    scheduled_job_id TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS scheduled_job_runs_job_idx ON scheduled_job_runs (scheduled_job_id);
"#;
