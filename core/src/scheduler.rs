//! Scheduler and Job Executor. The scheduler wakes on a fixed tick,
//! selects due `ScheduledJob`s, and relies on the store's CAS on
//! `status`/`running` for cross-process no-overlap. The Job Executor
//! translates a fired job's `kind` into Message Bus publishes.

use catalog_contracts::{CatalogStore, MessageBus};
use catalog_model::{
    BackgroundJobId, CollectionCreationMessage, CollectionScanMessage, MessageKind, RunStatus,
    ScheduleKind, ScheduledJob, ScheduledJobRun, TriggeredBy,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Translates `ScheduledJob.kind` into one or more bus publishes.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    store: Arc<dyn CatalogStore>,
    bus: Arc<dyn MessageBus>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn CatalogStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, bus }
    }

    /// Runs the work for one fired `ScheduledJob`, returning `Ok(())` on
    /// success. Must complete within the job's `timeoutMin`; the caller
    /// enforces the deadline with a `tokio::time::timeout`.
    pub async fn execute(&self, job: &ScheduledJob) -> anyhow::Result<()> {
        match job.kind.as_str() {
            "library.scan" => self.execute_library_scan(job).await,
            "collection.scan" => self.execute_collection_scan(job).await,
            "cache.audit" => Ok(()), // handled by the job monitor's own cadence, not here.
            other => {
                warn!(kind = other, "scheduled job has unrecognized kind, nothing to publish");
                Ok(())
            }
        }
    }

    async fn execute_library_scan(&self, job: &ScheduledJob) -> anyhow::Result<()> {
        let library_id = job
            .parameters
            .get("library_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("library.scan job missing `library_id` parameter"))?;
        let library_id = library_id.to_string().into();

        // One `CollectionScanMessage` per collection lets each collection
        // fail independently rather than one bad archive blocking the rest
        // of the library.
        let collections = self.store.list_collections_for_library(&library_id).await?;
        for collection in collections.into_iter().filter(|c| !c.is_deleted) {
            let msg = CollectionScanMessage {
                collection_id: collection.id.clone(),
                path: collection.path.clone(),
                kind: collection.kind,
                force_rescan: false,
            };
            self.bus
                .publish(MessageKind::CollectionScan, None, serde_json::to_value(&msg)?)
                .await?;
        }
        Ok(())
    }

    async fn execute_collection_scan(&self, job: &ScheduledJob) -> anyhow::Result<()> {
        let collection_id = job
            .parameters
            .get("collection_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("collection.scan job missing `collection_id` parameter"))?;
        let collection_id = collection_id.to_string().into();
        let Some(collection) = self.store.get_collection(&collection_id).await? else {
            return Ok(());
        };
        let msg = CollectionScanMessage {
            collection_id: collection.id,
            path: collection.path,
            kind: collection.kind,
            force_rescan: job.parameters.get("force_rescan").and_then(|v| v.as_bool()).unwrap_or(false),
        };
        self.bus
            .publish(MessageKind::CollectionScan, None, serde_json::to_value(&msg)?)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    store: Arc<dyn CatalogStore>,
    executor: Arc<JobExecutor>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<dyn CatalogStore>, executor: Arc<JobExecutor>, tick: Duration) -> Self {
        Self { store, executor, tick }
    }

    /// Computes the next fire time for a job.
    pub fn next_run_at(job: &ScheduledJob, now: DateTime<Utc>) -> DateTime<Utc> {
        match job.schedule_kind {
            ScheduleKind::Interval => job.next_interval_run_at(now),
            ScheduleKind::Cron => {
                let Some(expr) = &job.cron_expr else { return now };
                // `cron::Schedule` parses the 6-field (seconds-first) form;
                // `ScheduledJob.cronExpr` stores 5-field (minute-first)
                // expressions, so a leading `0` seconds field is prepended
                // here.
                let six_field = format!("0 {expr}");
                match cron::Schedule::from_str(&six_field) {
                    Ok(schedule) => {
                        let after = job.last_run_at.unwrap_or(now).max(now);
                        schedule.after(&after).next().unwrap_or(now)
                    }
                    Err(e) => {
                        warn!(expr, error = %e, "invalid cron expression, falling back to now");
                        now
                    }
                }
            }
        }
    }

    /// Runs the scheduler loop until the process shuts down. Never
    /// returns in normal operation.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick_once().await {
                error!(error = %e, "scheduler tick failed");
            }
        }
    }

    async fn tick_once(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let jobs = self.store.list_scheduled_jobs().await?;
        for job in jobs {
            if !job.enabled || job.running {
                continue;
            }
            if job.next_run_at.is_some_and(|t| t > now) {
                continue;
            }
            self.fire(&job, now).await;
        }
        Ok(())
    }

    async fn fire(&self, job: &ScheduledJob, now: DateTime<Utc>) {
        let Ok(Some(started)) = self.store.try_start_scheduled_job(&job.id, now).await else {
            return; // lost the CAS race to another scheduler instance, or not due.
        };

        let run = ScheduledJobRun::start(started.id.clone(), TriggeredBy::Scheduler, now);
        let run = match self.store.create_scheduled_job_run(run).await {
            Ok(run) => run,
            Err(e) => {
                error!(error = %e, "failed to record scheduled job run, forcing job back to idle");
                let _ = self.store.force_unlock_scheduled_job(&started.id).await;
                return;
            }
        };

        let timeout = Duration::from_secs(started.timeout_min.max(1) as u64 * 60);
        let outcome = tokio::time::timeout(timeout, self.executor.execute(&started)).await;

        let (success, error) = match outcome {
            Ok(Ok(())) => (true, None),
            Ok(Err(e)) => (false, Some(e.to_string())),
            Err(_) => (false, Some(format!("job exceeded {}m timeout", started.timeout_min))),
        };

        let mut run = run;
        run.finish(if success { RunStatus::Completed } else { RunStatus::Failed }, error, Utc::now());
        if let Err(e) = self.store.finish_scheduled_job_run(&run).await {
            error!(error = %e, "failed to close scheduled job run");
        }

        let next_run_at = Self::next_run_at(&started, Utc::now());
        if let Err(e) = self.store.finish_scheduled_job(&started.id, success, next_run_at).await {
            error!(error = %e, "failed to transition scheduled job back to idle");
        }

        info!(job = %started.id, success, "scheduled job run finished");
    }

    /// Emits a `CollectionCreationMessage`; used by the control API's
    /// "create collection" endpoint rather than the tick loop, but shares
    /// the scheduler's bus handle.
    pub async fn publish_collection_creation(
        bus: &dyn MessageBus,
        msg: CollectionCreationMessage,
        job_id: Option<BackgroundJobId>,
    ) -> anyhow::Result<()> {
        bus.publish(MessageKind::CollectionCreation, job_id, serde_json::to_value(&msg)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_model::ScheduledJobId;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn job(schedule_kind: ScheduleKind, cron_expr: Option<&str>, interval_min: Option<u32>) -> ScheduledJob {
        ScheduledJob {
            id: ScheduledJobId::new(),
            kind: "library.scan".into(),
            schedule_kind,
            cron_expr: cron_expr.map(String::from),
            interval_min,
            enabled: true,
            running: false,
            parameters: HashMap::new(),
            priority: 0,
            timeout_min: 30,
            max_retries: 3,
            last_run_at: None,
            next_run_at: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
        }
    }

    #[test]
    fn interval_job_next_run_uses_model_logic() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let j = job(ScheduleKind::Interval, None, Some(30));
        assert_eq!(Scheduler::next_run_at(&j, now), now);
    }

    #[test]
    fn cron_job_computes_next_match_after_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let j = job(ScheduleKind::Cron, Some("0 * * * *"), None);
        let next = Scheduler::next_run_at(&j, now);
        assert!(next > now);
    }

    #[test]
    fn invalid_cron_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let j = job(ScheduleKind::Cron, Some("not a cron expr"), None);
        assert_eq!(Scheduler::next_run_at(&j, now), now);
    }
}
