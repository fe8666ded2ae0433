use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header;
use serde::Deserialize;
use snafu::{ensure, ResultExt};
use tracing::debug;

use crate::err::{
    AssignFailedSnafu, HttpSnafu, Result, TruncatedReadSnafu, UnexpectedStatusSnafu,
};

/// A freshly assigned blob: the file id to record in the chunk log and the
/// volume server holding it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AssignedBlob {
    pub file_id: String,
    pub url: String,
}

/// The blob-tier surface this layer consumes: byte-range reads of existing
/// blobs, plus assignment-and-upload of new ones on the write path.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Fetch `size` bytes starting at `offset` inside the blob. Short
    /// responses are an error, the caller sized the request from the chunk
    /// log.
    async fn read_range(&self, url: &str, file_id: &str, offset: i64, size: u64) -> Result<Bytes>;

    /// Ask the tier for a fresh file id and upload `data` under it.
    async fn assign_and_upload(&self, data: Bytes) -> Result<AssignedBlob>;
}

pub type BlobStoreRef = Arc<dyn BlobStore>;

/// Blob tier over plain HTTP: range GETs against volume servers, and an
/// assign endpoint handing out file ids ahead of each upload.
pub struct HttpBlobStore {
    assign_endpoint: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(assign_endpoint: impl Into<String>) -> Self {
        Self {
            assign_endpoint: assign_endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssignResponse {
    #[serde(default)]
    fid: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    error: String,
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn read_range(&self, url: &str, file_id: &str, offset: i64, size: u64) -> Result<Bytes> {
        let target = format!("http://{}/{}", url, file_id);
        debug!("read {} [{}, {})", target, offset, offset + size as i64);

        let resp = self
            .client
            .get(&target)
            .header(
                header::RANGE,
                format!("bytes={}-{}", offset, offset + size as i64 - 1),
            )
            .send()
            .await
            .context(HttpSnafu { url: target.clone() })?;
        ensure!(
            resp.status().is_success(),
            UnexpectedStatusSnafu {
                url: target.clone(),
                status: resp.status(),
            }
        );

        let body = resp.bytes().await.context(HttpSnafu { url: target })?;
        ensure!(
            body.len() as u64 == size,
            TruncatedReadSnafu {
                file_id,
                want: size,
                got: body.len(),
            }
        );
        Ok(body)
    }

    async fn assign_and_upload(&self, data: Bytes) -> Result<AssignedBlob> {
        let resp = self
            .client
            .post(&self.assign_endpoint)
            .send()
            .await
            .context(HttpSnafu {
                url: self.assign_endpoint.clone(),
            })?;
        ensure!(
            resp.status().is_success(),
            UnexpectedStatusSnafu {
                url: self.assign_endpoint.clone(),
                status: resp.status(),
            }
        );
        let assign: AssignResponse = resp.json().await.context(HttpSnafu {
            url: self.assign_endpoint.clone(),
        })?;
        ensure!(assign.error.is_empty(), AssignFailedSnafu { reason: assign.error });

        let target = format!("http://{}/{}", assign.url, assign.fid);
        debug!("upload {} bytes to {}", data.len(), target);
        let resp = self
            .client
            .put(&target)
            .body(data)
            .send()
            .await
            .context(HttpSnafu { url: target.clone() })?;
        ensure!(
            resp.status().is_success(),
            UnexpectedStatusSnafu {
                url: target,
                status: resp.status(),
            }
        );

        Ok(AssignedBlob {
            file_id: assign.fid,
            url: assign.url,
        })
    }
}
