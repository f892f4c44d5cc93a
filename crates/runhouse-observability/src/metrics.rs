use lazy_static::lazy_static;
use prometheus::{
    core::Collector, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Write Path Metrics
    // ============================================================================

    /// Batches written, labelled by outcome (`ok`, `upload_failed`, `index_failed`, `both_failed`)
    pub static ref BATCHES_WRITTEN_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("runhouse_batches_written_total", "Total batch writes by outcome"),
        &["status"]
    ).expect("metric can be created");

    /// Runs persisted by successful batch writes
    pub static ref RUNS_WRITTEN_TOTAL: IntCounter = IntCounter::new(
        "runhouse_runs_written_total", "Total runs written"
    ).expect("metric can be created");

    /// Blob bytes uploaded to object storage
    pub static ref BLOB_BYTES_WRITTEN_TOTAL: IntCounter = IntCounter::new(
        "runhouse_blob_bytes_written_total", "Total batch blob bytes uploaded"
    ).expect("metric can be created");

    /// End-to-end batch write latency (upload and index insert joined)
    pub static ref WRITE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("runhouse_write_latency_seconds", "Batch write latency in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("metric can be created");

    // ============================================================================
    // Read Path Metrics
    // ============================================================================

    /// Run lookups, labelled by outcome (`found`, `not_found`)
    pub static ref RUNS_READ_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("runhouse_runs_read_total", "Total run lookups by outcome"),
        &["status"]
    ).expect("metric can be created");

    /// Payload fields served as `{}` instead of their stored bytes
    pub static ref FIELD_FALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("runhouse_field_fallbacks_total", "Payload fields replaced by an empty object"),
        &["field", "reason"]
    ).expect("metric can be created");

    /// Object store range read latency
    pub static ref RANGE_READ_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new("runhouse_range_read_latency_seconds", "Range read latency in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["field"]
    ).expect("metric can be created");

    // ============================================================================
    // Buffer Pool Metrics
    // ============================================================================

    pub static ref BUFFER_POOL_HITS_TOTAL: IntCounter = IntCounter::new(
        "runhouse_buffer_pool_hits_total", "Buffers served from the pool"
    ).expect("metric can be created");

    pub static ref BUFFER_POOL_MISSES_TOTAL: IntCounter = IntCounter::new(
        "runhouse_buffer_pool_misses_total", "Buffers freshly allocated"
    ).expect("metric can be created");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(BATCHES_WRITTEN_TOTAL.clone()),
            Box::new(RUNS_WRITTEN_TOTAL.clone()),
            Box::new(BLOB_BYTES_WRITTEN_TOTAL.clone()),
            Box::new(WRITE_LATENCY.clone()),
            Box::new(RUNS_READ_TOTAL.clone()),
            Box::new(FIELD_FALLBACKS_TOTAL.clone()),
            Box::new(RANGE_READ_LATENCY.clone()),
            Box::new(BUFFER_POOL_HITS_TOTAL.clone()),
            Box::new(BUFFER_POOL_MISSES_TOTAL.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric can be registered");
        }
    });
}

/// Content type of [`render`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Render every RunHouse metric in the Prometheus text format.
///
/// Registers the metrics first, so a scrape before [`init`] still lists them.
pub fn render() -> prometheus::Result<String> {
    init();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
