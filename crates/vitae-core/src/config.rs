//! Configuration module
//!
//! Configuration for the processor: database, object store, completion API, scheduler
//! and task queue settings. Values come from the environment (optionally seeded from a
//! `.env` file) with defaults for everything that is not a credential or a location.

use std::env;

use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const DB_TIMEOUT_SECS: u64 = 30;
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";
const OPENAI_MAX_TOKENS: u32 = 1000;
const OPENAI_TIMEOUT_SECS: u64 = 120;
const S3_REGION: &str = "us-east-1";
const SCHEDULER_INTERVAL_SECS: u64 = 10;
const TASK_QUEUE_MAX_WORKERS: usize = 10;
const TASK_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const TASK_QUEUE_DEFAULT_TIMEOUT_SECS: i32 = 600;
const TASK_QUEUE_MAX_RETRIES: i32 = 3;
const STALE_TASK_REAP_INTERVAL_SECS: u64 = 60;
const STALE_TASK_GRACE_PERIOD_SECS: i64 = 300;
const TASK_RETENTION_DAYS: i32 = 30;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: LogFormat,
    // Object store
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    // Completion API
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_max_tokens: u32,
    pub openai_timeout_secs: u64,
    // Scheduler
    pub scheduler_interval_secs: u64,
    // Task queue
    pub task_queue_max_workers: usize,
    pub task_queue_poll_interval_ms: u64,
    pub task_queue_default_timeout_seconds: i32,
    pub task_queue_max_retries: i32,
    /// Interval in seconds between runs of the stale task reaper. 0 = disabled.
    pub task_queue_stale_task_reap_interval_secs: u64,
    /// Grace period in seconds added to task timeout before reaping stale running tasks.
    pub task_queue_stale_task_grace_period_secs: i64,
    /// Retention in days for finished tasks. 0 = disabled.
    pub task_retention_days: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("DB_URL"))
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let log_format = match env::var("LOGGER_MODE")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        // S3_KEY / S3_SECRET are accepted for compatibility and exported under the
        // names the AWS credential chain reads.
        if env::var("AWS_ACCESS_KEY_ID").is_err() {
            if let Ok(key) = env::var("S3_KEY") {
                env::set_var("AWS_ACCESS_KEY_ID", key);
            }
        }
        if env::var("AWS_SECRET_ACCESS_KEY").is_err() {
            if let Ok(secret) = env::var("S3_SECRET") {
                env::set_var("AWS_SECRET_ACCESS_KEY", secret);
            }
        }

        Ok(Config {
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| DB_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DB_TIMEOUT_SECS),
            environment,
            log_format,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| S3_REGION.to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| OPENAI_BASE_URL.to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| OPENAI_MODEL.to_string()),
            openai_max_tokens: env::var("OPENAI_MAX_TOKENS")
                .unwrap_or_else(|_| OPENAI_MAX_TOKENS.to_string())
                .parse()
                .unwrap_or(OPENAI_MAX_TOKENS),
            openai_timeout_secs: env::var("OPENAI_TIMEOUT_SECS")
                .unwrap_or_else(|_| OPENAI_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(OPENAI_TIMEOUT_SECS),
            scheduler_interval_secs: env::var("SCHEDULER_INTERVAL_SECS")
                .unwrap_or_else(|_| SCHEDULER_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(SCHEDULER_INTERVAL_SECS),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_poll_interval_ms: env::var("TASK_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| TASK_QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_POLL_INTERVAL_MS),
            task_queue_default_timeout_seconds: env::var("TASK_QUEUE_DEFAULT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| TASK_QUEUE_DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_DEFAULT_TIMEOUT_SECS),
            task_queue_max_retries: env::var("TASK_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_RETRIES),
            task_queue_stale_task_reap_interval_secs: env::var(
                "TASK_QUEUE_STALE_TASK_REAP_INTERVAL_SECS",
            )
            .unwrap_or_else(|_| STALE_TASK_REAP_INTERVAL_SECS.to_string())
            .parse()
            .unwrap_or(STALE_TASK_REAP_INTERVAL_SECS),
            task_queue_stale_task_grace_period_secs: env::var(
                "TASK_QUEUE_STALE_TASK_GRACE_PERIOD_SECS",
            )
            .unwrap_or_else(|_| STALE_TASK_GRACE_PERIOD_SECS.to_string())
            .parse()
            .unwrap_or(STALE_TASK_GRACE_PERIOD_SECS),
            task_retention_days: env::var("TASK_RETENTION_DAYS")
                .unwrap_or_else(|_| TASK_RETENTION_DAYS.to_string())
                .parse()
                .unwrap_or(TASK_RETENTION_DAYS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.openai_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("OPENAI_API_KEY must be set"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.scheduler_interval_secs == 0 {
            return Err(anyhow::anyhow!("SCHEDULER_INTERVAL_SECS must be greater than 0"));
        }

        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!("TASK_QUEUE_MAX_WORKERS must be at least 1"));
        }

        if self.task_queue_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_POLL_INTERVAL_MS must be greater than 0"
            ));
        }

        Ok(())
    }
}
