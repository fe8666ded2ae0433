use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use reef_common::FH;
use reef_filer::{FilerClientRef, HttpFilerClient};
use reef_storage::{BlobStoreRef, HttpBlobStore, ReadScatter};
use tracing::debug;

use crate::{config::Config, file::File, handle::FileHandle};

/// The filer-side data plane: owns the filer and blob-tier clients and
/// mints file handles over [`File`]s.
pub struct ReefVFS {
    pub config: Config,

    handle_table: DashMap<FH, Arc<FileHandle>>,
    _next_fh: AtomicU64,

    // Dependencies
    filer: FilerClientRef,
    blob_store: BlobStoreRef,
    scatter: Arc<ReadScatter>,
}

impl ReefVFS {
    pub fn new(config: Config) -> Self {
        let filer: FilerClientRef = Arc::new(HttpFilerClient::new(config.filer_endpoint.clone()));
        let blob_store: BlobStoreRef = Arc::new(HttpBlobStore::new(config.assign_endpoint.clone()));
        Self::with_clients(config, filer, blob_store)
    }

    /// Wire in explicit clients, e.g. the in-memory pair used by tests.
    pub fn with_clients(config: Config, filer: FilerClientRef, blob_store: BlobStoreRef) -> Self {
        let scatter = Arc::new(ReadScatter::new(
            filer.clone(),
            blob_store.clone(),
            config.read_parallelism,
        ));
        Self {
            config,
            handle_table: DashMap::new(),
            _next_fh: AtomicU64::new(1),
            filer,
            blob_store,
            scatter,
        }
    }

    pub fn open(&self, file: Arc<File>) -> Arc<FileHandle> {
        let fh = self._next_fh.fetch_add(1, Ordering::SeqCst);
        file.is_open.store(true, Ordering::Release);
        debug!("{}/{} open fh {}", file.dir, file.name, fh);

        let handle = Arc::new(FileHandle::new(
            fh,
            file,
            self.filer.clone(),
            self.blob_store.clone(),
            self.scatter.clone(),
            self.config.zero_fill_read_holes,
        ));
        self.handle_table.insert(fh, handle.clone());
        handle
    }

    pub fn find_handle(&self, fh: FH) -> Option<Arc<FileHandle>> {
        self.handle_table.get(&fh).map(|h| h.value().clone())
    }

    pub async fn release(&self, fh: FH) {
        if let Some((_, handle)) = self.handle_table.remove(&fh) {
            handle.release().await;
        }
    }
}
