//! Server Settings
//!
//! Read once at startup from the environment, then from `.env` (or `.env.test`
//! when `RUN_HANDLER_ENV=test`). Process variables win over the file. Unset and
//! empty variables both fall back to the defaults below.
//!
//! | Variable | Default |
//! |---|---|
//! | `APP_TITLE` | `RunHouse` |
//! | `APP_DESCRIPTION` | `Run ingestion service` |
//! | `APP_VERSION` | crate version |
//! | `API_PORT` / `PORT` | `8000` |
//! | `DATABASE_URL` | built from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` |
//! | `S3_BUCKET_NAME` | `runs` |
//! | `S3_ENDPOINT_URL` | `http://localhost:9002` |
//! | `S3_ACCESS_KEY` / `S3_SECRET_KEY` | `minioadmin1` |
//! | `S3_REGION` | `us-east-1` |
//! | `RUNHOUSE_BUFFER_POOL` | `true` |
//!
//! A `DATABASE_URL` that is not a PostgreSQL URL selects the SQLite index.

use runhouse_storage::StorageConfig;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_title: String,
    pub app_description: String,
    pub app_version: String,
    pub port: u16,

    pub database_url: String,

    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_region: String,

    pub buffer_pool_enabled: bool,
}

impl Settings {
    /// Settings from the process environment and the matching dotenv file.
    pub fn load() -> Self {
        let run_env = std::env::var("RUN_HANDLER_ENV").ok();
        Self::load_with_file(env_file_name(run_env.as_deref()))
    }

    /// Settings from the process environment, falling back to `path`.
    ///
    /// A missing or unreadable file is the same as an empty one.
    pub fn load_with_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_vars: HashMap<String, String> = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No dotenv file loaded");
                HashMap::new()
            }
        };

        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = get("API_PORT")
            .or_else(|| get("PORT"))
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let database_url = get("DATABASE_URL").unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                get_or("DB_USER", "postgres"),
                get_or("DB_PASSWORD", "postgres"),
                get_or("DB_HOST", "localhost"),
                get_or("DB_PORT", "5432"),
                get_or("DB_NAME", "postgres"),
            )
        });

        let buffer_pool_enabled = get("RUNHOUSE_BUFFER_POOL")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "off"))
            .unwrap_or(true);

        Self {
            app_title: get_or("APP_TITLE", "RunHouse"),
            app_description: get_or("APP_DESCRIPTION", "Run ingestion service"),
            app_version: get_or("APP_VERSION", env!("CARGO_PKG_VERSION")),
            port,
            database_url,
            s3_bucket: get_or("S3_BUCKET_NAME", "runs"),
            s3_endpoint: get_or("S3_ENDPOINT_URL", "http://localhost:9002"),
            s3_access_key: get_or("S3_ACCESS_KEY", "minioadmin1"),
            s3_secret_key: get_or("S3_SECRET_KEY", "minioadmin1"),
            s3_region: get_or("S3_REGION", "us-east-1"),
            buffer_pool_enabled,
        }
    }

    pub fn uses_postgres(&self) -> bool {
        self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            bucket: self.s3_bucket.clone(),
            buffer_pool_enabled: self.buffer_pool_enabled,
            ..Default::default()
        }
    }
}

/// Dotenv file for the `RUN_HANDLER_ENV` mode.
pub fn env_file_name(run_env: Option<&str>) -> &'static str {
    match run_env {
        Some("test") => ".env.test",
        _ => ".env",
    }
}
