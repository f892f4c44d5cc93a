//! RunHouse Observability
//!
//! Prometheus metrics for the write and read paths.
//!
//! # Usage
//!
//! ```no_run
//! use runhouse_observability::metrics;
//!
//! metrics::init();
//! metrics::RUNS_WRITTEN_TOTAL.inc();
//! let text = metrics::render().unwrap();
//! ```

pub mod metrics;

pub use metrics::{init as init_metrics, render, REGISTRY};

/// Initialize all observability components
pub fn init() {
    metrics::init();
}
