//! The keyed location dataset backing the on-device fallback engine.

use std::collections::HashMap;

use async_trait::async_trait;
use bon::Builder;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use url::Url;

use crate::prelude::*;

/// Read-only mapping from lowercase term to a known location.
#[must_use]
#[derive(Debug, Default, Deserialize)]
pub struct Dataset(HashMap<String, Entry>);

impl Dataset {
    pub fn lookup(&self, term: &str) -> Option<&Entry> {
        self.0.get(term)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub country: String,
    pub reasoning: String,
}

/// Where the dataset comes from.
///
/// The local engine degrades to its fixed default guess when fetching
/// fails, so implementations are free to bail.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch(&self) -> Result<Dataset>;
}

/// Fetches the dataset uncached, once per analysis.
#[must_use]
#[derive(Clone, Builder)]
pub struct RemoteDataset {
    client: ClientWithMiddleware,
    url: Option<Url>,
}

#[async_trait]
impl DatasetSource for RemoteDataset {
    #[instrument(skip_all, err(level = Level::DEBUG))]
    async fn fetch(&self) -> Result<Dataset> {
        let url = self.url.clone().context("no dataset URL is configured")?;
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the location dataset")
    }
}
