use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use snafu::ensure;

use crate::{
    blob::{AssignedBlob, BlobStore},
    err::{BlobNotFoundSnafu, Result, TruncatedReadSnafu, UnavailableSnafu},
};

/// In-memory blob tier for tests and the debug configuration. Assignments
/// mint sequential needles inside a single fake volume.
pub struct MemBlobStore {
    volume: String,
    blobs: RwLock<HashMap<String, Bytes>>,
    next_needle: AtomicU64,
    fail_uploads: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemBlobStore {
    pub fn new(volume: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            volume: volume.into(),
            blobs: RwLock::new(HashMap::new()),
            next_needle: AtomicU64::new(1),
            fail_uploads: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        })
    }

    pub fn volume(&self) -> &str { &self.volume }

    pub fn blob(&self, file_id: &str) -> Option<Bytes> {
        self.blobs.read().unwrap().get(file_id).cloned()
    }

    /// Seed a blob under an explicit file id, bypassing assignment.
    pub fn insert_blob(&self, file_id: impl Into<String>, data: impl Into<Bytes>) {
        self.blobs.write().unwrap().insert(file_id.into(), data.into());
    }

    /// Fault injection: make every upload fail until reset.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::Release);
    }

    /// Fault injection: make every read fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }
}

#[async_trait]
impl BlobStore for MemBlobStore {
    async fn read_range(&self, _url: &str, file_id: &str, offset: i64, size: u64) -> Result<Bytes> {
        if self.fail_reads.load(Ordering::Acquire) {
            return UnavailableSnafu.fail();
        }
        let blobs = self.blobs.read().unwrap();
        let blob = blobs.get(file_id).cloned();
        drop(blobs);
        let blob = blob.ok_or_else(|| BlobNotFoundSnafu { file_id }.build())?;

        let start = offset as usize;
        let end = start + size as usize;
        ensure!(
            end <= blob.len(),
            TruncatedReadSnafu {
                file_id,
                want: size,
                got: blob.len().saturating_sub(start),
            }
        );
        Ok(blob.slice(start..end))
    }

    async fn assign_and_upload(&self, data: Bytes) -> Result<AssignedBlob> {
        if self.fail_uploads.load(Ordering::Acquire) {
            return UnavailableSnafu.fail();
        }
        let needle = self.next_needle.fetch_add(1, Ordering::AcqRel);
        let file_id = format!("{},{:08x}", self.volume, needle);
        self.blobs.write().unwrap().insert(file_id.clone(), data);
        Ok(AssignedBlob {
            file_id,
            url: "mem".to_string(),
        })
    }
}
