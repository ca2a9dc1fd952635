//! Image catalog ingestion and derivation service.
//!
//! Loads configuration, connects to Postgres (and, if configured, Redis),
//! runs the six-queue Message Bus's derivation worker pools, the
//! scheduler, and the job monitor as background tasks, and serves the
//! command/status REST API.

pub mod app_state;
pub mod errors;
pub mod routes;

use app_state::AppState;
use catalog_config::ConfigLoader;
use catalog_contracts::{CatalogStore, MessageBus};
use catalog_core::{
    DerivationHandler, DerivationKind, DispatchingArchiveReader, FilesystemCachePlacer,
    ImageCrateDecoder, JobExecutor, JobMonitor, PostgresCatalogStore, PostgresMessageBus, Scheduler,
};
use catalog_model::{HandlerOutcome, Queue};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_STORAGE_UNREACHABLE: i32 = 3;
const EXIT_BUS_UNREACHABLE: i32 = 4;

#[derive(Parser)]
#[command(name = "catalog-server", about = "Image catalog ingestion and derivation service")]
struct Cli {
    /// Path to a dotenv file to load before falling back to process env.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err((code, message)) = run().await {
        eprintln!("fatal: {message}");
        std::process::exit(code);
    }
}

async fn run() -> Result<(), (i32, String)> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_server=info,catalog_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut loader = ConfigLoader::new();
    if let Some(env_file) = cli.env_file {
        loader = loader.with_env_file(env_file);
    }
    let config = loader.load().map_err(|e| (EXIT_CONFIG_ERROR, format!("configuration error: {e}")))?;
    let config = Arc::new(config);
    info!("configuration loaded");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(16)
        .connect(&config.catalog_url)
        .await
        .map_err(|e| (EXIT_STORAGE_UNREACHABLE, format!("catalog store unreachable: {e}")))?;

    let store = PostgresCatalogStore::from_pool(pool.clone());
    store
        .migrate()
        .await
        .map_err(|e| (EXIT_STORAGE_UNREACHABLE, format!("catalog store migration failed: {e}")))?;
    let store: Arc<dyn CatalogStore> = Arc::new(store);

    let mut bus = PostgresMessageBus::new(pool, config.queue_max_length, config.max_requeue_attempts);
    if let Some(bus_url) = &config.bus_url {
        match redis::Client::open(bus_url.as_str()) {
            Ok(client) => bus = bus.with_redis_wake(client),
            Err(e) => warn!(error = %e, "failed to construct redis client for bus wake channel, continuing without it"),
        }
    }
    bus.setup()
        .await
        .map_err(|e| (EXIT_BUS_UNREACHABLE, format!("message bus unreachable: {e}")))?;
    let bus: Arc<dyn MessageBus> = Arc::new(bus);

    let archive = Arc::new(DispatchingArchiveReader::new());
    let decoder = Arc::new(ImageCrateDecoder::new());
    let placer = Arc::new(FilesystemCachePlacer::new(store.clone(), Duration::from_secs(3600)));

    let derivation = Arc::new(DerivationHandler::new(store.clone(), archive.clone(), decoder.clone(), placer.clone()));
    spawn_derivation_pool(bus.clone(), derivation.clone(), Queue::Thumbnail, DerivationKind::Thumbnail, config.thumbnail_worker_concurrency);
    spawn_derivation_pool(bus.clone(), derivation.clone(), Queue::Cache, DerivationKind::Cache, config.cache_worker_concurrency);
    spawn_derivation_pool(bus.clone(), derivation.clone(), Queue::Processing, DerivationKind::Processing, config.processing_worker_concurrency);
    spawn_scan_pool(store.clone(), bus.clone(), archive.clone(), decoder.clone(), config.scan_worker_concurrency, config.max_requeue_attempts as u32);

    let executor = Arc::new(JobExecutor::new(store.clone(), bus.clone()));
    let scheduler = Scheduler::new(store.clone(), executor.clone(), Duration::from_millis(config.scheduler_tick_ms));
    tokio::spawn(async move { scheduler.run().await });

    let monitor = JobMonitor::new(
        store.clone(),
        placer.clone(),
        Duration::from_secs(config.job_monitor_tick_sec),
        chrono::Duration::minutes(config.background_job_timeout_min as i64),
        Duration::from_secs(config.cache_root_audit_interval_min * 60),
        Duration::from_secs(config.orphan_grace_period_hours as u64 * 3600),
    );
    tokio::spawn(async move { monitor.run().await });

    let state = AppState { config: config.clone(), store, bus, executor };
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| (EXIT_STORAGE_UNREACHABLE, format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "catalog-server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| (EXIT_STORAGE_UNREACHABLE, format!("server error: {e}")))?;
    Ok(())
}

fn spawn_derivation_pool(
    bus: Arc<dyn MessageBus>,
    handler: Arc<DerivationHandler>,
    queue: Queue,
    kind: DerivationKind,
    concurrency: usize,
) {
    for worker in 0..concurrency.max(1) {
        let bus = bus.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            loop {
                let deliveries = match bus.consume(queue, 1).await {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(worker, ?queue, error = %e, "failed to poll queue");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                };
                if deliveries.is_empty() {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    continue;
                }
                for delivery in deliveries {
                    let msg = match delivery.payload_as::<catalog_model::DerivationMessage>() {
                        Ok(msg) => msg,
                        Err(e) => {
                            error!(error = %e, "malformed derivation message, dropping");
                            let _ = bus.nack_drop(&delivery.id).await;
                            continue;
                        }
                    };
                    let outcome = handler.handle(kind, &msg).await;
                    let result = match outcome {
                        HandlerOutcome::Ack => bus.ack(&delivery.id).await,
                        HandlerOutcome::NackRequeue => bus.nack_requeue(&delivery.id).await,
                        HandlerOutcome::NackDrop => bus.nack_drop(&delivery.id).await,
                    };
                    if let Err(e) = result {
                        error!(error = %e, "failed to finalize message disposition");
                    }
                }
            }
        });
    }
}

fn spawn_scan_pool(
    store: Arc<dyn CatalogStore>,
    bus: Arc<dyn MessageBus>,
    archive: Arc<DispatchingArchiveReader>,
    decoder: Arc<ImageCrateDecoder>,
    concurrency: usize,
    max_requeue_attempts: u32,
) {
    for worker in 0..concurrency.max(1) {
        let scanner = catalog_core::Scanner::new(store.clone(), bus.clone(), archive.clone(), decoder.clone(), max_requeue_attempts);
        let bus = bus.clone();
        tokio::spawn(async move {
            loop {
                let deliveries = match bus.consume(Queue::Scan, 1).await {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(worker, error = %e, "failed to poll scan queue");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                };
                if deliveries.is_empty() {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    continue;
                }
                for delivery in deliveries {
                    let msg = match delivery.payload_as::<catalog_model::CollectionScanMessage>() {
                        Ok(msg) => msg,
                        Err(e) => {
                            error!(error = %e, "malformed scan message, dropping");
                            let _ = bus.nack_drop(&delivery.id).await;
                            continue;
                        }
                    };
                    let result = scanner
                        .scan_collection(&msg.collection_id, &msg.path, msg.kind, msg.force_rescan, delivery.correlation_id.clone())
                        .await;
                    match result {
                        Ok(true) => {
                            let _ = bus.ack(&delivery.id).await;
                        }
                        Ok(false) => {
                            let _ = bus.nack_drop(&delivery.id).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "scan failed, nack-requeueing");
                            let _ = bus.nack_requeue(&delivery.id).await;
                        }
                    }
                }
            }
        });
    }
}
