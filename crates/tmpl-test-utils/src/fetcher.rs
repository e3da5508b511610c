//! In-memory [`Fetcher`] for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tmpl_source::{CancellationToken, Error, Fetcher, Location, Result};

/// Fetcher that serves registered payloads keyed by classified location.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    payloads: HashMap<Location, std::result::Result<Vec<u8>, String>>,
    fetched: Mutex<Vec<Location>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` for the location `raw` classifies to.
    pub fn with(mut self, raw: &str, contents: impl AsRef<[u8]>) -> Self {
        self.payloads
            .insert(Location::classify(raw), Ok(contents.as_ref().to_vec()));
        self
    }

    /// Fail fetches of `raw` with `message`.
    pub fn failing(mut self, raw: &str, message: &str) -> Self {
        self.payloads
            .insert(Location::classify(raw), Err(message.to_string()));
        self
    }

    /// Locations fetched so far, in call order.
    pub fn fetched(&self) -> Vec<Location> {
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                location: location.to_string(),
            });
        }
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(location.clone());

        match self.payloads.get(location) {
            Some(Ok(contents)) => Ok(contents.clone()),
            Some(Err(message)) => Err(Error::Registry {
                reference: location.to_string(),
                message: message.clone(),
            }),
            None => Err(Error::Registry {
                reference: location.to_string(),
                message: "not found".to_string(),
            }),
        }
    }
}
