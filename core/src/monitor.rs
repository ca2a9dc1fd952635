//! Job Monitor: reconciles stuck `BackgroundJob`s and `ScheduledJobRun`s
//! on a fast cadence, and `CacheRoot` accounting on a slower one.

use crate::placement::FilesystemCachePlacer;
use catalog_contracts::CatalogStore;
use catalog_model::{BackgroundJobStatus, RunStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct JobMonitor {
    store: Arc<dyn CatalogStore>,
    placer: Arc<FilesystemCachePlacer>,
    tick: Duration,
    background_job_timeout: chrono::Duration,
    cache_audit_interval: Duration,
    orphan_grace_period: Duration,
}

impl JobMonitor {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        placer: Arc<FilesystemCachePlacer>,
        tick: Duration,
        background_job_timeout: chrono::Duration,
        cache_audit_interval: Duration,
        orphan_grace_period: Duration,
    ) -> Self {
        Self { store, placer, tick, background_job_timeout, cache_audit_interval, orphan_grace_period }
    }

    pub async fn run(&self) {
        let mut ticks_since_audit = 0u64;
        let ticks_per_audit = (self.cache_audit_interval.as_secs() / self.tick.as_secs().max(1)).max(1);
        let mut interval = tokio::time::interval(self.tick);
        loop {
            interval.tick().await;
            if let Err(e) = self.reconcile_background_jobs().await {
                error!(error = %e, "job monitor failed to reconcile background jobs");
            }
            if let Err(e) = self.reconcile_scheduled_job_runs().await {
                error!(error = %e, "job monitor failed to reconcile scheduled job runs");
            }

            ticks_since_audit += 1;
            if ticks_since_audit >= ticks_per_audit {
                ticks_since_audit = 0;
                if let Err(e) = self.reconcile_cache_roots().await {
                    error!(error = %e, "job monitor failed to reconcile cache roots");
                }
            }
        }
    }

    async fn reconcile_background_jobs(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        for mut job in self.store.list_running_background_jobs().await? {
            if job.done + job.failed >= job.total {
                job.status = BackgroundJobStatus::Completed;
                job.completed_at = Some(now);
                self.store.update_background_job(&job).await?;
                continue;
            }
            let Some(started) = job.started_at else { continue };
            // Background jobs don't carry their own timeout field; they
            // inherit the same ceiling as scheduled-job runs since both
            // represent "one unit of pipeline work" bounded the same way.
            if now - started > self.background_job_timeout {
                warn!(job = %job.id, "background job exceeded timeout, marking failed");
                job.status = BackgroundJobStatus::Failed;
                job.completed_at = Some(now);
                job.last_error = Some("timed out".to_string());
                self.store.update_background_job(&job).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_scheduled_job_runs(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let cutoff = now - self.background_job_timeout;
        for mut run in self.store.list_stuck_scheduled_job_runs(cutoff).await? {
            warn!(run = %run.id, job = %run.scheduled_job_id, "scheduled job run stuck, marking failed and freeing job");
            run.finish(RunStatus::Failed, Some("run exceeded timeout, forcibly closed by job monitor".to_string()), now);
            self.store.finish_scheduled_job_run(&run).await?;
            self.store.force_unlock_scheduled_job(&run.scheduled_job_id).await?;
        }
        Ok(())
    }

    async fn reconcile_cache_roots(&self) -> anyhow::Result<()> {
        for root in self.store.list_cache_roots().await? {
            info!(root = %root.name, "running periodic cache root audit");
            self.placer.audit_once(&root, self.orphan_grace_period).await?;
        }
        Ok(())
    }
}
