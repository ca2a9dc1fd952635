use crate::ids::{ScheduledJobId, ScheduledJobRunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Cron,
    Interval,
}

/// A periodic trigger (cron or interval) that emits queue messages on
/// fire. Never has two concurrent `running` `ScheduledJobRun`s — enforced
/// by a compare-and-swap on `status` at the storage layer, not by this
/// type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: ScheduledJobId,
    pub kind: String,
    pub schedule_kind: ScheduleKind,
    pub cron_expr: Option<String>,
    pub interval_min: Option<u32>,
    pub enabled: bool,
    /// `true` while a `ScheduledJobRun` for this job is `running`.
    pub running: bool,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub priority: i32,
    pub timeout_min: u32,
    pub max_retries: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    Scheduler,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJobRun {
    pub id: ScheduledJobRunId,
    pub scheduled_job_id: ScheduledJobId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub triggered_by: TriggeredBy,
}

impl ScheduledJobRun {
    pub fn start(scheduled_job_id: ScheduledJobId, triggered_by: TriggeredBy, now: DateTime<Utc>) -> Self {
        Self {
            id: ScheduledJobRunId::new(),
            scheduled_job_id,
            status: RunStatus::Running,
            started_at: now,
            completed_at: None,
            duration_ms: None,
            error: None,
            triggered_by,
        }
    }

    pub fn finish(&mut self, status: RunStatus, error: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
        self.error = error;
    }
}

impl ScheduledJob {
    /// Computes `nextRunAt` for an interval-scheduled job. `cron_expr`
    /// jobs are parsed by the caller instead (the `cron` crate's schedule
    /// type isn't `Clone`-friendly to store on the model, so the model
    /// only carries the raw expression).
    pub fn next_interval_run_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = chrono::Duration::minutes(self.interval_min.unwrap_or(60) as i64);
        match self.last_run_at {
            Some(last) => last + interval,
            None => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job() -> ScheduledJob {
        ScheduledJob {
            id: ScheduledJobId::new(),
            kind: "library.scan".into(),
            schedule_kind: ScheduleKind::Interval,
            cron_expr: None,
            interval_min: Some(60),
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
    fn never_run_fires_immediately() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(job().next_interval_run_at(now), now);
    }

    #[test]
    fn interval_adds_to_last_run() {
        let mut j = job();
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        j.last_run_at = Some(last);
        let now = last + chrono::Duration::minutes(5);
        assert_eq!(j.next_interval_run_at(now), last + chrono::Duration::minutes(60));
    }
}
