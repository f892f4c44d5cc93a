//! RunHouse REST API Server
//!
//! HTTP/JSON front end for run ingestion:
//!
//! - `POST /runs`: store a batch of runs
//! - `GET /runs/:id`: stream one run back
//! - `GET /healthz`: liveness
//! - `GET /metrics`: Prometheus metrics

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use object_store::ObjectStore;
use runhouse_metadata::{IndexStore, SqliteIndexStore};
use runhouse_storage::{BatchWriter, BufferPool, RunReader, StorageConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

pub use config::Settings;
pub use error::ApiError;

/// Largest accepted `POST /runs` body.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub writer: Arc<BatchWriter>,
    pub reader: Arc<RunReader>,
}

impl AppState {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        config: StorageConfig,
    ) -> Self {
        let pool = Arc::new(BufferPool::from_config(&config));
        let writer = BatchWriter::with_pool(
            object_store.clone(),
            index.clone(),
            pool,
            config.clone(),
        );
        let reader = RunReader::new(object_store, index, config);

        Self {
            writer: Arc::new(writer),
            reader: Arc::new(reader),
        }
    }
}

/// Open the run index named by `settings.database_url`.
///
/// PostgreSQL URLs need the `postgres` feature, which is on by default; any
/// other URL is opened as SQLite.
pub async fn connect_index(
    settings: &Settings,
) -> Result<Arc<dyn IndexStore>, Box<dyn std::error::Error>> {
    if settings.uses_postgres() {
        #[cfg(feature = "postgres")]
        {
            tracing::info!("  Using PostgreSQL");
            let store =
                runhouse_metadata::PostgresIndexStore::new(&settings.database_url).await?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "postgres"))]
        {
            return Err("PostgreSQL URL provided but postgres feature not enabled".into());
        }
    }

    tracing::info!("  Using SQLite ({})", settings.database_url);
    Ok(Arc::new(SqliteIndexStore::from_url(&settings.database_url).await?))
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(handlers::runs::create_runs))
        .route("/runs/:id", get(handlers::runs::get_run))
        .route("/healthz", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the API server
pub async fn serve(router: Router, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("REST API server listening on {}", addr);
    tracing::info!("   Health: http://localhost:{}/healthz", port);
    tracing::info!("   Metrics: http://localhost:{}/metrics", port);

    axum::serve(listener, router).await?;
    Ok(())
}
