use std::{
    sync::{atomic::Ordering, Arc},
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use reef_common::FH;
use reef_filer::{FilerClientRef, OpContext};
use reef_storage::{BlobStoreRef, ReadScatter};
use reef_types::chunk::{view_from_chunks, view_from_chunks_with_holes, Chunk};
use reef_utils::readable_size::ReadableSize;
use snafu::{ensure, ResultExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    dirty_pages::ContinuousDirtyPages,
    err::{CancelledSnafu, EmptyFileSnafu, ReadFailedSnafu, Result, UpdateEntryFailedSnafu},
    file::File,
};

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One open handle on a [`File`]: routes reads through the range projection
/// and the scatter, buffers writes in the dirty pages, and pushes the entry
/// back to the filer on flush.
///
/// All four operations serialize on the handle's inner lock; nothing here
/// runs concurrently with anything else on the same handle.
pub struct FileHandle {
    pub fh: FH,
    pub(crate) file: Arc<File>,
    filer: FilerClientRef,
    scatter: Arc<ReadScatter>,
    zero_fill_read_holes: bool,
    inner: Mutex<FileHandleInner>,
}

struct FileHandleInner {
    dirty_pages: ContinuousDirtyPages,
    dirty_metadata: bool,
}

impl FileHandle {
    pub(crate) fn new(
        fh: FH,
        file: Arc<File>,
        filer: FilerClientRef,
        blob_store: BlobStoreRef,
        scatter: Arc<ReadScatter>,
        zero_fill_read_holes: bool,
    ) -> Self {
        Self {
            fh,
            file,
            filer,
            scatter,
            zero_fill_read_holes,
            inner: Mutex::new(FileHandleInner {
                dirty_pages: ContinuousDirtyPages::new(blob_store),
                dirty_metadata: false,
            }),
        }
    }

    /// Read `[offset, offset+size)` of the current file view. The returned
    /// buffer is truncated to the bytes actually covered: a hole in the
    /// chunk log ends the read early unless zero-filling was configured.
    pub async fn read(&self, ctx: &OpContext, offset: i64, size: usize) -> Result<Bytes> {
        let _inner = self.inner.lock().await;
        debug!(
            "{}/{} read fh {}: [{}, {})",
            self.file.dir,
            self.file.name,
            self.fh,
            offset,
            offset + size as i64
        );

        let chunks = self.file.chunk_snapshot().await;
        ensure!(
            !chunks.is_empty(),
            EmptyFileSnafu {
                dir: self.file.dir.clone(),
                name: self.file.name.clone(),
            }
        );

        let views = if self.zero_fill_read_holes {
            view_from_chunks_with_holes(&chunks, offset, size as u64)
        } else {
            view_from_chunks(&chunks, offset, size as u64)
        };
        let covered = views
            .last()
            .map(|v| (v.logic_offset + v.size as i64 - offset) as usize)
            .unwrap_or(0);

        let mut buf = vec![0u8; size];
        let total_read = self
            .scatter
            .read(ctx, views, &mut buf, offset)
            .await
            .context(ReadFailedSnafu {
                dir: self.file.dir.clone(),
                name: self.file.name.clone(),
            })?;

        // With zero-filling the buffer extends to the last covered byte and
        // interior holes stay zero; otherwise the plan was contiguous and
        // total_read is exactly how far it got.
        buf.truncate(if self.zero_fill_read_holes { covered } else { total_read });
        Ok(Bytes::from(buf))
    }

    /// Buffer one write. If it broke the contiguous run, the previous run
    /// comes back as a chunk and is appended to the log right away.
    pub async fn write(&self, ctx: &OpContext, offset: i64, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        debug!(
            "{}/{} write fh {}: [{}, {})",
            self.file.dir,
            self.file.name,
            self.fh,
            offset,
            offset + data.len() as i64
        );

        if let Some(chunk) = inner.dirty_pages.add_page(ctx, offset, data).await? {
            self.append_chunk(&mut inner, chunk).await;
        }
        self.file.grow(offset + data.len() as i64);
        Ok(data.len())
    }

    /// Evict the dirty pages and, if anything changed since the last
    /// successful flush, persist the full chunk list back to the filer.
    pub async fn flush(&self, ctx: &OpContext) -> Result<()> {
        let mut inner = self.inner.lock().await;
        debug!("{}/{} flush fh {}", self.file.dir, self.file.name, self.fh);

        if let Some(chunk) = inner.dirty_pages.flush_to_storage(ctx).await? {
            self.append_chunk(&mut inner, chunk).await;
        }

        if !inner.dirty_metadata {
            return Ok(());
        }

        let chunks = self.file.chunk_snapshot().await;
        if chunks.is_empty() {
            debug!("{}/{} flush skipping empty entry", self.file.dir, self.file.name);
            return Ok(());
        }

        info!(
            "{}/{} set chunks: {}, size {}",
            self.file.dir,
            self.file.name,
            chunks.len(),
            ReadableSize(self.file.attributes().file_size)
        );
        let entry = self.file.to_entry(chunks);
        tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => return CancelledSnafu.fail(),
            updated = self.filer.update_entry(&self.file.dir, entry) => {
                updated.context(UpdateEntryFailedSnafu {
                    dir: self.file.dir.clone(),
                    name: self.file.name.clone(),
                })?
            }
        }

        // only a durable update clears the flag; failures above leave it
        // set so the next flush retries
        inner.dirty_metadata = false;
        Ok(())
    }

    /// Close the handle. Anything not flushed is gone.
    pub async fn release(&self) {
        let _inner = self.inner.lock().await;
        debug!("{}/{} release fh {}", self.file.dir, self.file.name, self.fh);
        self.file.is_open.store(false, Ordering::Release);
    }

    async fn append_chunk(&self, inner: &mut FileHandleInner, chunk: Chunk) {
        info!(
            "uploaded {}/{} to {} [{}, {})",
            self.file.dir,
            self.file.name,
            chunk.file_id,
            chunk.offset,
            chunk.stop()
        );
        self.file.chunks.write().await.push(chunk);
        inner.dirty_metadata = true;
    }
}
