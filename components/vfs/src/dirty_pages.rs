use bytes::{BufMut, Bytes, BytesMut};
use reef_filer::OpContext;
use reef_storage::BlobStoreRef;
use reef_types::chunk::Chunk;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    err::{CancelledSnafu, Result, UploadFailedSnafu},
    handle::unix_now,
};

/// Write-side accumulator for one handle: at most one contiguous region of
/// bytes not yet materialized as a chunk.
///
/// Sequential streaming writes coalesce into a single region; the first
/// non-contiguous write evicts the region to the blob tier and starts a new
/// one. A failed upload keeps the region so a later flush can retry.
pub(crate) struct ContinuousDirtyPages {
    blob_store: BlobStoreRef,
    pending: Option<DirtyRegion>,
}

struct DirtyRegion {
    base: i64,
    bytes: BytesMut,
}

impl DirtyRegion {
    fn starting_at(offset: i64, data: &[u8]) -> Self {
        let mut bytes = BytesMut::with_capacity(data.len());
        bytes.put_slice(data);
        Self {
            base: offset,
            bytes,
        }
    }

    fn stop(&self) -> i64 { self.base + self.bytes.len() as i64 }
}

impl ContinuousDirtyPages {
    pub(crate) fn new(blob_store: BlobStoreRef) -> Self {
        Self {
            blob_store,
            pending: None,
        }
    }

    /// Absorb one write. Returns the chunk minted from the previous region
    /// when this write broke contiguity and forced it out.
    pub(crate) async fn add_page(
        &mut self,
        ctx: &OpContext,
        offset: i64,
        data: &[u8],
    ) -> Result<Option<Chunk>> {
        match &mut self.pending {
            None => {
                self.pending = Some(DirtyRegion::starting_at(offset, data));
                Ok(None)
            }
            Some(region) if offset == region.stop() => {
                region.bytes.put_slice(data);
                Ok(None)
            }
            Some(_) => {
                let flushed = self.flush_to_storage(ctx).await?;
                self.pending = Some(DirtyRegion::starting_at(offset, data));
                Ok(flushed)
            }
        }
    }

    /// Evict the pending region, if any: upload it and mint the chunk that
    /// now stands for those bytes. The region is only cleared once the
    /// upload went through.
    pub(crate) async fn flush_to_storage(&mut self, ctx: &OpContext) -> Result<Option<Chunk>> {
        let Some(region) = &self.pending else {
            return Ok(None);
        };

        let data = Bytes::copy_from_slice(&region.bytes);
        let assigned = tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => return CancelledSnafu.fail(),
            assigned = self.blob_store.assign_and_upload(data) => {
                assigned.context(UploadFailedSnafu)?
            }
        };

        let chunk = Chunk::new(
            assigned.file_id,
            region.base,
            region.bytes.len() as u64,
            unix_now(),
        );
        debug!(
            "dirty pages flushed to {} [{}, {})",
            chunk.file_id,
            chunk.offset,
            chunk.stop()
        );
        self.pending = None;
        Ok(Some(chunk))
    }
}
