//! Blob Buffer Pool
//!
//! Batch blobs are built in a single contiguous buffer. Under steady ingest the
//! same few sizes are allocated over and over, so buffers are recycled through
//! a pool keyed by power-of-two size class.
//!
//! ## Size Classes
//!
//! ```text
//! class 0: capacity >= 4KB
//! class 1: capacity >= 8KB
//! ...
//! class N: capacity >= max_buffer_size
//! ```
//!
//! A request for `n` bytes is served from the class of `n.next_power_of_two()`;
//! a released buffer goes into the class of its capacity rounded *down*, so
//! every buffer in a class is at least as large as the class size.
//!
//! ## Discipline
//!
//! - `acquire` always returns an empty buffer
//! - `release` clears the buffer before it is kept
//! - a disabled pool allocates on every `acquire` and drops on every `release`
//!
//! Nothing depends on a buffer coming from the pool; it only saves allocations.

use bytes::{Bytes, BytesMut};
use runhouse_observability::metrics::{BUFFER_POOL_HITS_TOTAL, BUFFER_POOL_MISSES_TOTAL};
use std::sync::{Mutex, MutexGuard};

use crate::config::StorageConfig;

const MIN_CLASS_SHIFT: u32 = 12; // 4KB

/// Size-classed pool of reusable byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    enabled: bool,
    max_per_class: usize,
    max_buffer_size: usize,
    classes: Vec<Mutex<Vec<BytesMut>>>,
}

impl BufferPool {
    /// Create an enabled pool.
    pub fn new(max_per_class: usize, max_buffer_size: usize) -> Self {
        // Round up so every hint the pool accepts maps to an existing class.
        let max_buffer_size = max_buffer_size
            .max(1 << MIN_CLASS_SHIFT)
            .checked_next_power_of_two()
            .unwrap_or(1 << (usize::BITS - 1));
        let class_count = class_for_capacity(max_buffer_size).unwrap_or(0) + 1;

        Self {
            enabled: true,
            max_per_class,
            max_buffer_size,
            classes: (0..class_count).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Create a pool that never retains buffers.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_per_class: 0,
            max_buffer_size: 0,
            classes: Vec::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        if config.buffer_pool_enabled {
            Self::new(
                config.buffer_pool_max_per_class,
                config.buffer_pool_max_buffer_size,
            )
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get an empty buffer with capacity for at least `size_hint` bytes.
    pub fn acquire(&self, size_hint: usize) -> BytesMut {
        let size_hint = size_hint.max(1);

        let class = class_for_request(size_hint);
        if self.enabled && class < self.classes.len() {
            if let Some(buf) = self.slot(class).pop() {
                BUFFER_POOL_HITS_TOTAL.inc();
                debug_assert!(buf.is_empty());
                return buf;
            }
            BUFFER_POOL_MISSES_TOTAL.inc();
            return BytesMut::with_capacity(class_size(class));
        }

        BUFFER_POOL_MISSES_TOTAL.inc();
        BytesMut::with_capacity(size_hint)
    }

    /// Return a buffer to the pool. Its contents are discarded.
    pub fn release(&self, mut buf: BytesMut) {
        if !self.enabled || buf.capacity() > self.max_buffer_size {
            return;
        }
        let Some(class) = class_for_capacity(buf.capacity()) else {
            return;
        };

        buf.clear();
        let mut slot = self.slot(class);
        if slot.len() < self.max_per_class {
            slot.push(buf);
        }
    }

    /// Return frozen bytes to the pool if no other handle still shares them.
    pub fn reclaim(&self, bytes: Bytes) {
        if !self.enabled {
            return;
        }
        if let Ok(buf) = bytes.try_into_mut() {
            self.release(buf);
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle_buffers(&self) -> usize {
        (0..self.classes.len()).map(|c| self.slot(c).len()).sum()
    }

    fn slot(&self, class: usize) -> MutexGuard<'_, Vec<BytesMut>> {
        // A poisoned slot only holds empty buffers; keep using it.
        match self.classes[class].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

fn class_size(class: usize) -> usize {
    1 << (class as u32 + MIN_CLASS_SHIFT)
}

/// Smallest class whose buffers can hold `size` bytes.
fn class_for_request(size: usize) -> usize {
    let shift = size.next_power_of_two().trailing_zeros().max(MIN_CLASS_SHIFT);
    (shift - MIN_CLASS_SHIFT) as usize
}

/// Largest class a buffer of `capacity` bytes satisfies, if any.
fn class_for_capacity(capacity: usize) -> Option<usize> {
    if capacity < (1 << MIN_CLASS_SHIFT) {
        return None;
    }
    let floor_shift = usize::BITS - 1 - capacity.leading_zeros();
    Some((floor_shift - MIN_CLASS_SHIFT) as usize)
}
