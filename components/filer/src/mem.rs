use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use async_trait::async_trait;
use reef_types::entry::Entry;

use crate::{
    client::{FilerClient, Location, Locations},
    err::{Result, UnavailableSnafu},
};

/// In-memory filer for tests and the debug configuration. Volumes are
/// published by hand; entries live in a plain map keyed by directory + name.
#[derive(Default)]
pub struct MemFiler {
    locations: RwLock<HashMap<String, Locations>>,
    entries: RwLock<HashMap<(String, String), Entry>>,
    fail_lookups: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemFiler {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn publish_volume(&self, volume_id: impl Into<String>, url: impl Into<String>) {
        self.locations.write().unwrap().insert(
            volume_id.into(),
            Locations {
                locations: vec![Location {
                    url: url.into(),
                    public_url: String::new(),
                }],
            },
        );
    }

    pub fn entry(&self, directory: &str, name: &str) -> Option<Entry> {
        self.entries
            .read()
            .unwrap()
            .get(&(directory.to_string(), name.to_string()))
            .cloned()
    }

    /// Fault injection: make every lookup fail until reset.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::Release);
    }

    /// Fault injection: make every entry update fail until reset.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::Release);
    }
}

#[async_trait]
impl FilerClient for MemFiler {
    async fn lookup_volume(&self, volume_ids: Vec<String>) -> Result<HashMap<String, Locations>> {
        if self.fail_lookups.load(Ordering::Acquire) {
            return UnavailableSnafu.fail();
        }
        let locations = self.locations.read().unwrap();
        Ok(volume_ids
            .into_iter()
            .filter_map(|vid| locations.get(&vid).map(|l| (vid, l.clone())))
            .collect())
    }

    async fn update_entry(&self, directory: &str, entry: Entry) -> Result<()> {
        if self.fail_updates.load(Ordering::Acquire) {
            return UnavailableSnafu.fail();
        }
        self.entries
            .write()
            .unwrap()
            .insert((directory.to_string(), entry.name.clone()), entry);
        Ok(())
    }
}
