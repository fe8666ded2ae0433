use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use reef_types::entry::Entry;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use tracing::debug;

use crate::err::{HttpSnafu, Result, UnexpectedStatusSnafu};

/// One reachable replica of a volume.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub url: String,
    #[serde(default)]
    pub public_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Locations {
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupVolumeRequest {
    pub volume_ids: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LookupVolumeResponse {
    pub locations_map: HashMap<String, Locations>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    pub directory: String,
    pub entry: Entry,
}

/// The two filer operations this layer consumes. The filer owns the durable
/// chunk log; we only resolve volumes and push updated entries back.
#[async_trait]
pub trait FilerClient: Send + Sync + 'static {
    async fn lookup_volume(&self, volume_ids: Vec<String>) -> Result<HashMap<String, Locations>>;

    async fn update_entry(&self, directory: &str, entry: Entry) -> Result<()>;
}

pub type FilerClientRef = Arc<dyn FilerClient>;

/// Talks JSON over HTTP to a filer endpoint.
pub struct HttpFilerClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpFilerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FilerClient for HttpFilerClient {
    async fn lookup_volume(&self, volume_ids: Vec<String>) -> Result<HashMap<String, Locations>> {
        let url = format!("{}/volumes/lookup", self.endpoint);
        debug!("lookup volume locations: {:?}", volume_ids);

        let resp = self
            .client
            .post(&url)
            .json(&LookupVolumeRequest { volume_ids })
            .send()
            .await
            .context(HttpSnafu { url: url.clone() })?;
        ensure!(
            resp.status().is_success(),
            UnexpectedStatusSnafu {
                url: url.clone(),
                status: resp.status(),
            }
        );

        let resp: LookupVolumeResponse = resp.json().await.context(HttpSnafu { url })?;
        Ok(resp.locations_map)
    }

    async fn update_entry(&self, directory: &str, entry: Entry) -> Result<()> {
        let url = format!("{}/entries/update", self.endpoint);
        debug!("{}/{} update entry, {} chunks", directory, entry.name, entry.chunks.len());

        let resp = self
            .client
            .post(&url)
            .json(&UpdateEntryRequest {
                directory: directory.to_string(),
                entry,
            })
            .send()
            .await
            .context(HttpSnafu { url: url.clone() })?;
        ensure!(
            resp.status().is_success(),
            UnexpectedStatusSnafu {
                url,
                status: resp.status(),
            }
        );
        Ok(())
    }
}
