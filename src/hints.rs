//! Reverse-image-search hint source.
//!
//! Hints are advisory, never blocking: any upstream failure is logged
//! and swallowed, and the pipeline proceeds without them.

use bon::Builder;
use itertools::Itertools;
use reqwest::multipart::{Form, Part};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::prelude::*;

const MAX_VISUAL_MATCH_TITLES: usize = 5;

#[must_use]
#[derive(Clone, Builder)]
pub struct HintSource {
    client: ClientWithMiddleware,

    /// Image hosting endpoint producing a public URL.
    host_url: Url,

    /// Root URL of the search relay.
    relay_url: Url,
}

impl HintSource {
    /// Fetch auxiliary context about the image, best-effort.
    #[instrument(skip_all)]
    pub async fn fetch(&self, image: &[u8], preference: Option<&str>) -> String {
        match self.try_fetch(image, preference).await {
            Ok(hints) => hints,
            Err(error) => {
                warn!("⚠️ Hints unavailable: {error:#}");
                String::new()
            }
        }
    }

    async fn try_fetch(&self, image: &[u8], preference: Option<&str>) -> Result<String> {
        let image_url = self.upload(image).await?;
        let response = self.search(&image_url, preference).await?;
        Ok(digest(response))
    }

    /// Upload the image to obtain a public URL. One attempt, no retry.
    async fn upload(&self, image: &[u8]) -> Result<Url> {
        info!(n_bytes = image.len(), "📤 Uploading…");
        let part = Part::bytes(image.to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .context("failed to build the upload part")?;
        let response: UploadResponse = self
            .client
            .post(self.host_url.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the upload response")?;
        Ok(response.data.url)
    }

    async fn search(&self, image_url: &Url, preference: Option<&str>) -> Result<SearchResponse> {
        info!("🔎 Searching…");
        let request = SearchRequest { url: image_url.as_str(), preference };
        let mut url =
            self.relay_url.join("search.json").context("failed to build the relay URL")?;
        url.set_query(Some(
            &serde_qs::to_string(&request).context("failed to serialize the search request")?,
        ));
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the search response")
    }
}

#[must_use]
#[derive(Serialize)]
struct SearchRequest<'a> {
    url: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    preference: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Url,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    ai_overview: Option<AiOverview>,

    #[serde(default)]
    visual_matches: Vec<VisualMatch>,
}

#[derive(Debug, Deserialize)]
struct AiOverview {
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VisualMatch {
    title: String,
}

/// Prefer the overview narrative, fall back to visual-match titles.
fn digest(response: SearchResponse) -> String {
    let narrative = response
        .ai_overview
        .map(|overview| {
            overview
                .references
                .into_iter()
                .filter_map(|reference| reference.snippet)
                .filter(|snippet| !snippet.trim().is_empty())
                .join(" ")
        })
        .unwrap_or_default();
    if !narrative.is_empty() {
        return narrative;
    }
    response
        .visual_matches
        .into_iter()
        .map(|visual_match| visual_match.title)
        .filter(|title| !title.trim().is_empty())
        .take(MAX_VISUAL_MATCH_TITLES)
        .join("; ")
}
