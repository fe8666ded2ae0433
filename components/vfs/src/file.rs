use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};

use reef_types::{
    chunk::Chunk,
    entry::{Entry, FileAttributes},
};
use tokio::sync::RwLock as AsyncRwLock;

use crate::handle::unix_now;

/// One file as this layer sees it: a name under a directory, mutable
/// attributes, and the append-only chunk log.
///
/// The log is shared read-only with every reader of the file; only the
/// handle that opened it appends, under that handle's exclusion.
pub struct File {
    pub dir: String,
    pub name: String,
    attributes: RwLock<FileAttributes>,
    pub(crate) chunks: AsyncRwLock<Vec<Chunk>>,
    pub(crate) is_open: AtomicBool,
}

impl File {
    pub fn new(
        dir: impl Into<String>,
        name: impl Into<String>,
        attributes: FileAttributes,
        chunks: Vec<Chunk>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.into(),
            name: name.into(),
            attributes: RwLock::new(attributes),
            chunks: AsyncRwLock::new(chunks),
            is_open: AtomicBool::new(false),
        })
    }

    pub fn is_open(&self) -> bool { self.is_open.load(Ordering::Acquire) }

    pub fn attributes(&self) -> FileAttributes { self.attributes.read().unwrap().clone() }

    /// The chunk log is append-only, so a cloned snapshot stays coherent
    /// for the duration of a read.
    pub async fn chunk_snapshot(&self) -> Vec<Chunk> { self.chunks.read().await.clone() }

    pub(crate) fn grow(&self, stop: i64) {
        let mut attributes = self.attributes.write().unwrap();
        if stop as u64 > attributes.file_size {
            attributes.file_size = stop as u64;
        }
        attributes.mtime = unix_now();
    }

    pub(crate) fn to_entry(&self, chunks: Vec<Chunk>) -> Entry {
        Entry {
            name: self.name.clone(),
            attributes: self.attributes(),
            chunks,
        }
    }
}
