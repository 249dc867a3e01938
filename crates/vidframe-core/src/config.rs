//! Configuration module
//!
//! All four processes read the same environment. Settings that only one process
//! needs are optional at load time and enforced by [`Config::validate_for`].

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_FRAME_RATE, DEFAULT_MAX_VIDEO_SIZE_MB, DEFAULT_RETENTION_DAYS,
    DEFAULT_VIDEO_EXTENSIONS,
};
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 8080;
const QUEUE_MAX_DELIVERIES: i32 = 5;
const QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const QUEUE_VISIBILITY_TIMEOUT_SECS: i64 = 3900;
const FFMPEG_TIMEOUT_SECS: u64 = 3600;
const WORKER_LEASE_SECS: i64 = 3600;
const SMTP_PORT: u16 = 587;

/// The process a configuration is being validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Gateway,
    Worker,
    Notifier,
    Sweeper,
}

/// Message broker backend selected by `QUEUE_BACKEND`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Postgres,
    Sqs,
}

impl FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(QueueBackend::Postgres),
            "sqs" => Ok(QueueBackend::Sqs),
            _ => Err(anyhow::anyhow!("Invalid queue backend: {}", s)),
        }
    }
}

impl Display for QueueBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            QueueBackend::Postgres => write!(f, "postgres"),
            QueueBackend::Sqs => write!(f, "sqs"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VidframeConfig {
    pub environment: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: Option<String>,
    pub internal_api_key: Option<String>,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, LocalStack)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Queue
    pub queue_backend: QueueBackend,
    pub sqs_queue_url_prefix: Option<String>,
    pub queue_max_deliveries: i32,
    pub queue_poll_interval_ms: u64,
    pub queue_visibility_timeout_secs: i64,
    // Upload admission
    pub max_video_size_bytes: usize,
    pub video_allowed_extensions: Vec<String>,
    pub retention_days: i64,
    pub frame_rate: i32,
    // Frame worker
    pub ffmpeg_path: String,
    pub ffmpeg_timeout_secs: u64,
    pub worker_lease_secs: i64,
    pub worker_build_archive: bool,
    // Notifier
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
    pub log_format: String,
}

/// Application configuration shared by every binary.
#[derive(Clone, Debug)]
pub struct Config(pub Box<VidframeConfig>);

impl Config {
    fn inner(&self) -> &VidframeConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = VidframeConfig::from_source(|key| env::var(key).ok())?;
        Ok(Config(Box::new(config)))
    }

    pub fn is_production(&self) -> bool {
        let env = self.inner().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate_for(&self, role: ServiceRole) -> Result<(), anyhow::Error> {
        self.inner().validate_for(role)
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        self.inner().jwt_secret.as_deref()
    }

    pub fn internal_api_key(&self) -> Option<&str> {
        self.inner().internal_api_key.as_deref()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn queue_backend(&self) -> QueueBackend {
        self.inner().queue_backend
    }

    pub fn sqs_queue_url_prefix(&self) -> Option<&str> {
        self.inner().sqs_queue_url_prefix.as_deref()
    }

    pub fn queue_max_deliveries(&self) -> i32 {
        self.inner().queue_max_deliveries
    }

    pub fn queue_poll_interval_ms(&self) -> u64 {
        self.inner().queue_poll_interval_ms
    }

    pub fn queue_visibility_timeout_secs(&self) -> i64 {
        self.inner().queue_visibility_timeout_secs
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.inner().max_video_size_bytes
    }

    pub fn video_allowed_extensions(&self) -> &[String] {
        &self.inner().video_allowed_extensions
    }

    pub fn retention_days(&self) -> i64 {
        self.inner().retention_days
    }

    pub fn frame_rate(&self) -> i32 {
        self.inner().frame_rate
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn ffmpeg_timeout_secs(&self) -> u64 {
        self.inner().ffmpeg_timeout_secs
    }

    pub fn worker_lease_secs(&self) -> i64 {
        self.inner().worker_lease_secs
    }

    pub fn worker_build_archive(&self) -> bool {
        self.inner().worker_build_archive
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.inner().smtp_host.as_deref()
    }

    pub fn smtp_port(&self) -> u16 {
        self.inner().smtp_port
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.inner().smtp_user.as_deref()
    }

    pub fn smtp_password(&self) -> Option<&str> {
        self.inner().smtp_password.as_deref()
    }

    pub fn smtp_from(&self) -> Option<&str> {
        self.inner().smtp_from.as_deref()
    }

    pub fn smtp_tls(&self) -> bool {
        self.inner().smtp_tls
    }

    pub fn log_json(&self) -> bool {
        self.inner().log_format.eq_ignore_ascii_case("json")
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool_or(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| v.trim().to_lowercase())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl VidframeConfig {
    /// Build the configuration from a key lookup (the process environment in production).
    pub fn from_source<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = non_empty("ENVIRONMENT")
            .or_else(|| non_empty("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };
        let queue_backend = match non_empty("QUEUE_BACKEND") {
            Some(value) => value.parse()?,
            None => QueueBackend::Postgres,
        };

        let max_video_size_mb = parse_or(non_empty("MAX_VIDEO_SIZE_MB"), DEFAULT_MAX_VIDEO_SIZE_MB);
        let video_allowed_extensions = split_list(
            &non_empty("VIDEO_ALLOWED_EXTENSIONS")
                .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSIONS.to_string()),
        );

        let frame_rate = parse_or(non_empty("FRAME_RATE"), DEFAULT_FRAME_RATE);

        Ok(VidframeConfig {
            environment,
            server_port: match non_empty("SERVER_PORT").or_else(|| non_empty("PORT")) {
                Some(port) => port
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
                None => SERVER_PORT,
            },
            database_url: non_empty("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_or(non_empty("DB_MAX_CONNECTIONS"), MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(non_empty("DB_TIMEOUT_SECONDS"), CONNECTION_TIMEOUT_SECS),
            jwt_secret: non_empty("JWT_SECRET"),
            internal_api_key: non_empty("INTERNAL_API_KEY"),
            storage_backend,
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            aws_region: non_empty("AWS_REGION"),
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty("LOCAL_STORAGE_BASE_URL"),
            queue_backend,
            sqs_queue_url_prefix: non_empty("SQS_QUEUE_URL_PREFIX"),
            queue_max_deliveries: parse_or(non_empty("QUEUE_MAX_DELIVERIES"), QUEUE_MAX_DELIVERIES)
                .max(1),
            queue_poll_interval_ms: parse_or(
                non_empty("QUEUE_POLL_INTERVAL_MS"),
                QUEUE_POLL_INTERVAL_MS,
            ),
            queue_visibility_timeout_secs: parse_or(
                non_empty("QUEUE_VISIBILITY_TIMEOUT_SECS"),
                QUEUE_VISIBILITY_TIMEOUT_SECS,
            ),
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            video_allowed_extensions,
            retention_days: parse_or(non_empty("RETENTION_DAYS"), DEFAULT_RETENTION_DAYS),
            frame_rate: if frame_rate > 0 {
                frame_rate
            } else {
                DEFAULT_FRAME_RATE
            },
            ffmpeg_path: non_empty("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffmpeg_timeout_secs: parse_or(non_empty("FFMPEG_TIMEOUT_SECS"), FFMPEG_TIMEOUT_SECS),
            worker_lease_secs: parse_or(non_empty("WORKER_LEASE_SECS"), WORKER_LEASE_SECS),
            worker_build_archive: parse_bool_or(non_empty("WORKER_BUILD_ARCHIVE"), true),
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: parse_or(non_empty("SMTP_PORT"), SMTP_PORT),
            smtp_user: non_empty("SMTP_USER"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            smtp_from: non_empty("SMTP_FROM"),
            smtp_tls: parse_bool_or(non_empty("SMTP_TLS"), true),
            log_format: non_empty("LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
        })
    }

    pub fn validate_for(&self, role: ServiceRole) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.queue_backend == QueueBackend::Sqs && self.sqs_queue_url_prefix.is_none() {
            return Err(anyhow::anyhow!(
                "SQS_QUEUE_URL_PREFIX must be set when using the SQS queue backend"
            ));
        }

        match role {
            ServiceRole::Gateway => match self.jwt_secret.as_deref() {
                None => return Err(anyhow::anyhow!("JWT_SECRET must be set for authentication")),
                Some(secret) if secret.len() < 32 => {
                    return Err(anyhow::anyhow!(
                        "JWT_SECRET must be at least 32 characters long"
                    ))
                }
                Some(_) => {}
            },
            ServiceRole::Worker => {
                if self.worker_lease_secs <= 0 {
                    return Err(anyhow::anyhow!("WORKER_LEASE_SECS must be positive"));
                }
                if self.queue_backend == QueueBackend::Postgres
                    && self.queue_visibility_timeout_secs <= self.worker_lease_secs
                {
                    return Err(anyhow::anyhow!(
                        "QUEUE_VISIBILITY_TIMEOUT_SECS must exceed WORKER_LEASE_SECS"
                    ));
                }
            }
            ServiceRole::Notifier => {
                if self.smtp_host.is_none() || self.smtp_from.is_none() {
                    return Err(anyhow::anyhow!(
                        "The notifier requires SMTP_HOST and SMTP_FROM to be set"
                    ));
                }
            }
            ServiceRole::Sweeper => {}
        }

        Ok(())
    }
}
