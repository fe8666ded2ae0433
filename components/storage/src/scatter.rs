use std::{collections::HashSet, sync::Arc};

use bytes::Bytes;
use reef_filer::{FilerClientRef, OpContext};
use reef_types::{chunk::ChunkView, file_id::volume_id};
use snafu::{OptionExt, ResultExt};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::{
    blob::BlobStoreRef,
    err::{CancelledSnafu, FailedToLocateSnafu, JoinErrSnafu, LookupSnafu, Result},
};

/// Fans a projected sub-read plan out across the blob tier.
///
/// One volume lookup covers the whole plan; each view then fetches
/// concurrently, bounded by `max_parallel` permits. Sub-reads land in
/// disjoint slices of the output buffer, so the only coordination is the
/// first error observed.
pub struct ReadScatter {
    filer: FilerClientRef,
    blob_store: BlobStoreRef,
    permits: Arc<Semaphore>,
}

impl ReadScatter {
    pub fn new(filer: FilerClientRef, blob_store: BlobStoreRef, max_parallel: usize) -> Self {
        Self {
            filer,
            blob_store,
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// Realize `views` into `buf`, which the caller addressed from
    /// `base_offset`. Returns the total bytes written. On error the buffer
    /// contents are unspecified and must not be consumed.
    pub async fn read(
        &self,
        ctx: &OpContext,
        views: Vec<ChunkView>,
        buf: &mut [u8],
        base_offset: i64,
    ) -> Result<usize> {
        if views.is_empty() {
            return Ok(0);
        }

        let mut seen = HashSet::new();
        let mut vids = Vec::new();
        for view in &views {
            let vid = volume_id(&view.file_id);
            if seen.insert(vid.to_string()) {
                vids.push(vid.to_string());
            }
        }

        debug!("lookup volume locations: {:?}", vids);
        let locations_map = tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => return CancelledSnafu.fail(),
            resp = self.filer.lookup_volume(vids) => resp.context(LookupSnafu)?,
        };

        let mut tasks = Vec::with_capacity(views.len());
        for view in views {
            let url = locations_map
                .get(volume_id(&view.file_id))
                .and_then(|l| l.locations.first())
                .map(|l| l.url.clone())
                .context(FailedToLocateSnafu {
                    file_id: view.file_id.clone(),
                })?;

            let blob_store = self.blob_store.clone();
            let permits = self.permits.clone();
            let token = ctx.cancellation_token.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore closed");
                let data = tokio::select! {
                    biased;
                    _ = token.cancelled() => return CancelledSnafu.fail(),
                    data = blob_store.read_range(&url, &view.file_id, view.offset, view.size) => data?,
                };
                debug!("read {} bytes of {}", data.len(), view.file_id);
                Ok::<(ChunkView, Bytes), crate::err::Error>((view, data))
            }));
        }

        let mut total_read = 0;
        let mut first_err = None;
        for joined in futures::future::join_all(tasks).await {
            match joined.context(JoinErrSnafu)? {
                Ok((view, data)) => {
                    let start = (view.logic_offset - base_offset) as usize;
                    buf[start..start + data.len()].copy_from_slice(&data);
                    total_read += data.len();
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(total_read)
    }
}

#[cfg(test)]
mod tests {
    use reef_filer::MemFiler;
    use reef_types::chunk::{view_from_chunks, Chunk};

    use super::*;
    use crate::err::Error;
    use crate::mem::MemBlobStore;

    fn fixture() -> (Arc<MemFiler>, Arc<MemBlobStore>, Vec<Chunk>) {
        let filer = MemFiler::new();
        filer.publish_volume("3", "mem");

        let blob_store = MemBlobStore::new("3");
        blob_store.insert_blob("3,01", vec![b'a'; 100]);
        blob_store.insert_blob("3,02", vec![b'b'; 200]);

        let chunks = vec![
            Chunk::new("3,01", 0, 100, 123),
            Chunk::new("3,02", 50, 200, 134),
        ];
        (filer, blob_store, chunks)
    }

    #[tokio::test]
    async fn scatter_assembles_overlapping_chunks() {
        let (filer, blob_store, chunks) = fixture();
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let views = view_from_chunks(&chunks, 0, 250);
        let mut buf = vec![0u8; 250];
        let n = scatter
            .read(&OpContext::background(), views, &mut buf, 0)
            .await
            .unwrap();

        assert_eq!(n, 250);
        assert!(buf[..50].iter().all(|&b| b == b'a'));
        assert!(buf[50..250].iter().all(|&b| b == b'b'));
    }

    #[tokio::test]
    async fn scatter_honors_the_base_offset() {
        let (filer, blob_store, chunks) = fixture();
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let views = view_from_chunks(&chunks, 40, 20);
        let mut buf = vec![0u8; 20];
        let n = scatter
            .read(&OpContext::background(), views, &mut buf, 40)
            .await
            .unwrap();

        assert_eq!(n, 20);
        assert!(buf[..10].iter().all(|&b| b == b'a'));
        assert!(buf[10..].iter().all(|&b| b == b'b'));
    }

    #[tokio::test]
    async fn unknown_volume_fails_the_whole_read() {
        let (filer, blob_store, mut chunks) = fixture();
        chunks.push(Chunk::new("9,99", 250, 10, 200));
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let views = view_from_chunks(&chunks, 0, 260);
        let mut buf = vec![0u8; 260];
        let err = scatter
            .read(&OpContext::background(), views, &mut buf, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FailedToLocate { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn lookup_failure_fails_the_whole_read() {
        let (filer, blob_store, chunks) = fixture();
        filer.set_fail_lookups(true);
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let views = view_from_chunks(&chunks, 0, 100);
        let mut buf = vec![0u8; 100];
        let err = scatter
            .read(&OpContext::background(), views, &mut buf, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn missing_blob_surfaces_the_first_error() {
        let (filer, blob_store, mut chunks) = fixture();
        chunks.push(Chunk::new("3,07", 250, 10, 200));
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let views = view_from_chunks(&chunks, 0, 260);
        let mut buf = vec![0u8; 260];
        let err = scatter
            .read(&OpContext::background(), views, &mut buf, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BlobNotFound { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_the_read() {
        let (filer, blob_store, chunks) = fixture();
        let scatter = ReadScatter::new(filer, blob_store, 4);

        let ctx = OpContext::background();
        ctx.cancellation_token.cancel();

        let views = view_from_chunks(&chunks, 0, 100);
        let mut buf = vec![0u8; 100];
        let err = scatter.read(&ctx, views, &mut buf, 0).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn empty_plan_reads_nothing() {
        let (filer, blob_store, _) = fixture();
        let scatter = ReadScatter::new(filer, blob_store, 4);
        let mut buf = vec![0u8; 10];
        let n = scatter
            .read(&OpContext::background(), vec![], &mut buf, 0)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
