use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::{EditError, EditResult};
use crate::types::ImageResult;

pub const SERVICE: &str = "image search";

/// Stock-photo lookup backing the `search_image` tool.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Best match for `query`, or `None` when the search found nothing.
    async fn search(&self, query: &str) -> EditResult<Option<ImageResult>>;
}

/// Unsplash `/search/photos` client.
pub struct UnsplashSearch {
    client: Client,
    access_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    urls: PhotoUrls,
    alt_description: Option<String>,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
    full: Option<String>,
}

impl UnsplashSearch {
    pub fn new(
        access_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> EditResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EditError::upstream(SERVICE, format!("client setup failed: {}", e)))?;
        Ok(Self {
            client,
            access_key: access_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, query: &str) -> EditResult<Url> {
        let mut url = Url::parse(&format!("{}/search/photos", self.base_url))
            .map_err(|e| EditError::upstream(SERVICE, format!("bad base url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", "1")
            .append_pair("orientation", "landscape");
        Ok(url)
    }
}

#[async_trait]
impl ImageSearch for UnsplashSearch {
    async fn search(&self, query: &str) -> EditResult<Option<ImageResult>> {
        let url = self.search_url(query)?;
        tracing::debug!(query, "searching images");

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .send()
            .await
            .map_err(|e| EditError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(EditError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, raw),
            ));
        }

        let body: SearchBody = response
            .json()
            .await
            .map_err(|e| EditError::upstream(SERVICE, format!("unreadable response: {}", e)))?;

        let found = body.results.into_iter().find_map(|photo| {
            let url = photo.urls.regular.or(photo.urls.full)?;
            Some(ImageResult {
                url,
                description: photo.alt_description,
            })
        });
        tracing::debug!(query, found = found.is_some(), "image search finished");
        Ok(found)
    }
}
