//! Fault-injecting store wrappers shared by the storage integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::{
    memory::InMemory, path::Path, GetOptions, GetResult, ListResult, MultipartId, ObjectMeta,
    ObjectStore, PutOptions, PutResult, Result,
};
use runhouse_metadata::{IndexRow, IndexStore, MetadataError, SqliteIndexStore};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWrite;
use uuid::Uuid;

// ============================================================================
// Object Store
// ============================================================================

/// In-memory object store that can fail uploads and range reads on demand.
pub struct FaultyObjectStore {
    inner: InMemory,
    fail_puts: AtomicBool,
    fail_ranges: AtomicBool,
    puts: AtomicUsize,
    range_delays: Mutex<HashMap<usize, Duration>>,
}

impl FaultyObjectStore {
    pub fn new() -> Self {
        Self {
            inner: InMemory::new(),
            fail_puts: AtomicBool::new(false),
            fail_ranges: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
            range_delays: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ranges(&self, fail: bool) {
        self.fail_ranges.store(fail, Ordering::SeqCst);
    }

    /// Delay range reads starting at byte `start`.
    pub fn delay_range(&self, start: usize, delay: Duration) {
        self.range_delays.lock().unwrap().insert(start, delay);
    }

    /// Upload attempts, failed ones included.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Keys of stored objects.
    pub async fn keys(&self) -> Vec<String> {
        use futures::TryStreamExt;
        let objects: Vec<ObjectMeta> = self.inner.list(None).try_collect().await.unwrap();
        objects.into_iter().map(|m| m.location.to_string()).collect()
    }

    /// Raw stored bytes of `key`.
    pub async fn blob(&self, key: &str) -> Bytes {
        self.inner
            .get(&Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap()
    }

    fn injected(what: &str) -> object_store::Error {
        object_store::Error::Generic {
            store: "FaultyObjectStore",
            source: format!("injected {} failure", what).into(),
        }
    }
}

impl Debug for FaultyObjectStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyObjectStore").finish()
    }
}

impl Display for FaultyObjectStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FaultyObjectStore")
    }
}

#[async_trait]
impl ObjectStore for FaultyObjectStore {
    async fn put(&self, location: &Path, bytes: Bytes) -> Result<PutResult> {
        self.put_opts(location, bytes, PutOptions::default()).await
    }

    async fn put_opts(&self, location: &Path, bytes: Bytes, opts: PutOptions) -> Result<PutResult> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::injected("upload"));
        }
        self.inner.put_opts(location, bytes, opts).await
    }

    async fn put_multipart(
        &self,
        location: &Path,
    ) -> Result<(MultipartId, Box<dyn AsyncWrite + Unpin + Send>)> {
        self.inner.put_multipart(location).await
    }

    async fn abort_multipart(&self, location: &Path, multipart_id: &MultipartId) -> Result<()> {
        self.inner.abort_multipart(location, multipart_id).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn get_range(&self, location: &Path, range: Range<usize>) -> Result<Bytes> {
        let delay = self.range_delays.lock().unwrap().get(&range.start).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_ranges.load(Ordering::SeqCst) {
            return Err(Self::injected("range read"));
        }
        self.inner.get_range(location, range).await
    }

    async fn delete(&self, location: &Path) -> Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

// ============================================================================
// Index Store
// ============================================================================

/// SQLite index that can fail calls or scramble the returned id order.
pub struct FaultyIndexStore {
    inner: SqliteIndexStore,
    fail_inserts: AtomicBool,
    fail_lookups: AtomicBool,
    reverse_returned: AtomicBool,
}

impl FaultyIndexStore {
    pub async fn new() -> Self {
        Self {
            inner: SqliteIndexStore::new_in_memory().await.unwrap(),
            fail_inserts: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            reverse_returned: AtomicBool::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn reverse_returned(&self, reverse: bool) {
        self.reverse_returned.store(reverse, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexStore for FaultyIndexStore {
    async fn insert_rows(&self, rows: &[IndexRow]) -> runhouse_metadata::Result<Vec<Uuid>> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(MetadataError::InvalidRow("injected insert failure".to_string()));
        }
        let mut ids = self.inner.insert_rows(rows).await?;
        if self.reverse_returned.load(Ordering::SeqCst) {
            ids.reverse();
        }
        Ok(ids)
    }

    async fn get_row(&self, id: Uuid) -> runhouse_metadata::Result<Option<IndexRow>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(MetadataError::InvalidRow("injected lookup failure".to_string()));
        }
        self.inner.get_row(id).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub store: Arc<FaultyObjectStore>,
    pub index: Arc<FaultyIndexStore>,
    pub writer: runhouse_storage::BatchWriter,
    pub reader: runhouse_storage::RunReader,
}

pub async fn harness(config: runhouse_storage::StorageConfig) -> Harness {
    let store = Arc::new(FaultyObjectStore::new());
    let index = Arc::new(FaultyIndexStore::new().await);

    let writer = runhouse_storage::BatchWriter::new(
        store.clone() as Arc<dyn ObjectStore>,
        index.clone() as Arc<dyn IndexStore>,
        config.clone(),
    );
    let reader = runhouse_storage::RunReader::new(
        store.clone() as Arc<dyn ObjectStore>,
        index.clone() as Arc<dyn IndexStore>,
        config,
    );

    Harness {
        store,
        index,
        writer,
        reader,
    }
}
