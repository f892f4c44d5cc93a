//! Storage Configuration
//!
//! - **bucket**: bucket holding batch blobs; also the container recorded in every reference
//! - **buffer_pool_enabled**: reuse blob buffers across requests (default: true)
//! - **buffer_pool_max_per_class**: buffers retained per size class (default: 16)
//! - **buffer_pool_max_buffer_size**: larger buffers are never retained (default: 16MB)
//!
//! ## Usage
//!
//! ```ignore
//! use runhouse_storage::StorageConfig;
//!
//! let config = StorageConfig {
//!     bucket: "runs-test".to_string(),
//!     buffer_pool_enabled: false,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket name for batch blobs
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Whether blob buffers are pooled
    #[serde(default = "default_buffer_pool_enabled")]
    pub buffer_pool_enabled: bool,

    /// Maximum idle buffers kept per size class
    #[serde(default = "default_buffer_pool_max_per_class")]
    pub buffer_pool_max_per_class: usize,

    /// Buffers with a larger capacity are dropped instead of pooled
    #[serde(default = "default_buffer_pool_max_buffer_size")]
    pub buffer_pool_max_buffer_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            buffer_pool_enabled: default_buffer_pool_enabled(),
            buffer_pool_max_per_class: default_buffer_pool_max_per_class(),
            buffer_pool_max_buffer_size: default_buffer_pool_max_buffer_size(),
        }
    }
}

fn default_bucket() -> String {
    "runs".to_string()
}

fn default_buffer_pool_enabled() -> bool {
    true
}

fn default_buffer_pool_max_per_class() -> usize {
    16
}

fn default_buffer_pool_max_buffer_size() -> usize {
    16 * 1024 * 1024 // 16MB
}
