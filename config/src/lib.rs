//! Configuration loading for the ingestion service: a typed [`Config`]
//! assembled by [`ConfigLoader`] from defaults, an optional `.env` file,
//! process environment, and CLI overrides, in that order of precedence.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Runtime configuration for every long-lived component the process
/// entry point owns. No ambient global state: each component instance is
/// constructed explicitly from this struct.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_url: String,
    pub bus_url: Option<String>,
    /// Consumed by the external read-API/auth layer only; this service
    /// reads them so a shared `.env` doesn't fail to parse, but never acts
    /// on them itself.
    pub jwt_key: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    pub server_host: String,
    pub server_port: u16,

    pub scan_worker_concurrency: usize,
    pub thumbnail_worker_concurrency: usize,
    pub cache_worker_concurrency: usize,
    pub processing_worker_concurrency: usize,

    pub queue_max_length: u32,
    pub queue_message_ttl_sec: u64,
    pub queue_prefetch: u32,
    pub max_requeue_attempts: u32,

    pub scheduler_tick_ms: u64,
    pub job_monitor_tick_sec: u64,
    pub cache_root_audit_interval_min: u64,
    pub background_job_timeout_min: u64,

    pub tombstone_window_hours: i64,
    pub orphan_grace_period_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: "postgres://localhost/catalog".to_string(),
            bus_url: None,
            jwt_key: None,
            jwt_issuer: None,
            jwt_audience: None,
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            scan_worker_concurrency: 4,
            thumbnail_worker_concurrency: 8,
            cache_worker_concurrency: 4,
            processing_worker_concurrency: 4,
            queue_max_length: 10_000,
            queue_message_ttl_sec: 24 * 3600,
            queue_prefetch: 16,
            max_requeue_attempts: 3,
            scheduler_tick_ms: 1_000,
            job_monitor_tick_sec: 5,
            cache_root_audit_interval_min: 15,
            background_job_timeout_min: 60,
            tombstone_window_hours: 72,
            orphan_grace_period_hours: 24,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads defaults, then overlays `.env`/process environment.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                other => Err(other),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                other => Err(other),
            })?,
        };
        tracing::debug!(env_file_loaded, "configuration .env lookup complete");

        let mut config = Config::default();

        if let Ok(url) = std::env::var("CATALOG_URL") {
            config.catalog_url = url;
        } else if env_file_loaded {
            return Err(ConfigError::MissingVar("CATALOG_URL"));
        }
        config.bus_url = std::env::var("BUS_URL").ok();
        config.jwt_key = std::env::var("JWT_KEY").ok();
        config.jwt_issuer = std::env::var("JWT_ISSUER").ok();
        config.jwt_audience = std::env::var("JWT_AUDIENCE").ok();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server_host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server_port = port
                .parse()
                .map_err(|e| ConfigError::InvalidValue { key: "SERVER_PORT", message: format!("{e}") })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.queue_prefetch > 0);
        assert!(config.scan_worker_concurrency > 0);
        assert!(config.max_requeue_attempts >= 1);
    }

    #[test]
    fn loader_overlays_server_port_from_env() {
        // SAFETY: test runs single-threaded w.r.t. this env var; no other
        // test in this crate touches SERVER_PORT/CATALOG_URL.
        unsafe {
            std::env::set_var("CATALOG_URL", "postgres://localhost/test");
            std::env::set_var("SERVER_PORT", "9999");
        }
        let loader = ConfigLoader::new().with_env_file("/nonexistent/.env");
        let config = loader.load().expect("load should succeed from process env alone");
        assert_eq!(config.server_port, 9999);
        unsafe {
            std::env::remove_var("SERVER_PORT");
            std::env::remove_var("CATALOG_URL");
        }
    }
}
