//! Scheduler no-overlap guarantee and job-kind fan-out.

mod support;

use catalog_contracts::MessageBus;
use catalog_model::{Collection, CollectionKind, CollectionStats, Library, Queue, ScheduleKind, ScheduledJob};
use catalog_core::JobExecutor;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use support::{InMemoryCatalogStore, InMemoryMessageBus};

fn interval_job() -> ScheduledJob {
    ScheduledJob {
        id: catalog_model::ScheduledJobId::new(),
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

#[tokio::test]
async fn two_concurrent_schedulers_racing_the_same_job_only_one_wins() {
    let store = Arc::new(InMemoryCatalogStore::new());
    let job = interval_job();
    let job_id = job.id.clone();
    store.seed_scheduled_job(job);

    let now = Utc::now();
    let store_a = store.clone();
    let store_b = store.clone();
    let id_a = job_id.clone();
    let id_b = job_id.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { store_a.try_start_scheduled_job(&id_a, now).await.unwrap() }),
        tokio::spawn(async move { store_b.try_start_scheduled_job(&id_b, now).await.unwrap() }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.is_some(), b.is_some(), "exactly one of the two racing starts should win the CAS");

    let job = store.get_scheduled_job(&job_id).await.unwrap().unwrap();
    assert!(job.running);
    assert_eq!(job.run_count, 1);
}

#[tokio::test]
async fn a_job_already_running_cannot_be_started_again() {
    let store = Arc::new(InMemoryCatalogStore::new());
    let job = interval_job();
    let job_id = job.id.clone();
    store.seed_scheduled_job(job);

    let now = Utc::now();
    assert!(store.try_start_scheduled_job(&job_id, now).await.unwrap().is_some());
    assert!(store.try_start_scheduled_job(&job_id, now).await.unwrap().is_none());

    store.force_unlock_scheduled_job(&job_id).await.unwrap();
    assert!(store.try_start_scheduled_job(&job_id, now).await.unwrap().is_some());
}

#[tokio::test]
async fn library_scan_job_publishes_one_collection_scan_message_per_collection() {
    let store = Arc::new(InMemoryCatalogStore::new());
    let bus = Arc::new(InMemoryMessageBus::new());

    let library = Library {
        id: catalog_model::LibraryId::new(),
        name: "lib".into(),
        root_path: "/lib".into(),
        watch_enabled: true,
        scan_interval_sec: 3600,
        allowed_formats: vec![],
        excluded_paths: vec![],
        is_deleted: false,
        created_at: Utc::now(),
    };
    let library_id = library.id.clone();
    store.seed_library(library);

    for i in 0..3 {
        store.seed_collection(Collection {
            id: catalog_model::CollectionId::new(),
            library_id: library_id.clone(),
            name: format!("vol-{i}"),
            path: format!("/lib/vol-{i}"),
            kind: CollectionKind::Folder,
            settings: Default::default(),
            images: vec![],
            stats: CollectionStats::default(),
            is_deleted: false,
            scan_error: None,
            created_at: Utc::now(),
        });
    }
    // A deleted collection must not be scanned.
    store.seed_collection(Collection {
        id: catalog_model::CollectionId::new(),
        library_id: library_id.clone(),
        name: "deleted".into(),
        path: "/lib/deleted".into(),
        kind: CollectionKind::Folder,
        settings: Default::default(),
        images: vec![],
        stats: CollectionStats::default(),
        is_deleted: true,
        scan_error: None,
        created_at: Utc::now(),
    });

    let executor = JobExecutor::new(store.clone(), bus.clone());
    let mut job = interval_job();
    job.kind = "library.scan".into();
    job.parameters.insert("library_id".into(), serde_json::json!(library_id.as_str()));

    executor.execute(&job).await.unwrap();

    assert_eq!(bus.queue_len(Queue::Scan), 3);
}
