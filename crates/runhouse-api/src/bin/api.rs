//! RunHouse REST API Server Binary
//!
//! # Environment Variables
//!
//! See [`runhouse_api::Settings`] for the full list. The common ones:
//!
//! - `DATABASE_URL`: PostgreSQL URL, or a `sqlite://` URL
//! - `API_PORT` / `PORT`: HTTP port (default: 8000)
//! - `S3_ENDPOINT_URL`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`, `S3_REGION`: object store
//! - `S3_BUCKET_NAME`: bucket for batch blobs (default: runs)
//! - `RUST_LOG`: Log level (default: info)
//!
//! # Example
//!
//! ```bash
//! export DATABASE_URL=sqlite://./data/runs.db
//! export S3_ENDPOINT_URL=http://localhost:9002
//! export S3_ACCESS_KEY=minioadmin1
//! export S3_SECRET_KEY=minioadmin1
//! cargo run --bin api
//! ```

use object_store::{aws::AmazonS3Builder, ObjectStore};
use runhouse_api::{connect_index, create_router, serve, AppState, Settings};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load();
    info!("{} {} starting...", settings.app_title, settings.app_version);
    info!("  {}", settings.app_description);

    runhouse_observability::init();

    // Connect to run index
    info!("Connecting to run index...");
    let index = connect_index(&settings).await?;
    info!("✓ Run index connected");

    // Setup object store
    let object_store: Arc<dyn ObjectStore> = Arc::new(
        AmazonS3Builder::new()
            .with_bucket_name(&settings.s3_bucket)
            .with_endpoint(&settings.s3_endpoint)
            .with_access_key_id(&settings.s3_access_key)
            .with_secret_access_key(&settings.s3_secret_key)
            .with_region(&settings.s3_region)
            .with_allow_http(true) // Allow HTTP for MinIO
            .build()?,
    );

    info!(
        "✓ Object store configured (bucket: {}, endpoint: {})",
        settings.s3_bucket, settings.s3_endpoint
    );
    info!(
        "  Payload references into buckets other than '{}' read back as {{}}",
        settings.s3_bucket
    );

    let state = AppState::new(object_store, index, settings.storage_config());
    if !state.writer.config().buffer_pool_enabled {
        info!("  Buffer pool disabled");
    }

    serve(create_router(state), settings.port).await
}
