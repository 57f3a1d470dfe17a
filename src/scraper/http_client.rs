use crate::config::ScraperConfig;
use crate::scraper::FetchError;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

/// What a station page response looked like, before the dataset decides
/// whether it counts as data, a skip, or a retry.
#[derive(Debug)]
pub struct PageResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    response: reqwest::Response,
}

impl PageResponse {
    pub async fn text(self, url: &Url) -> Result<String, FetchError> {
        self.response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// One GET, no retry. Status handling is left to the caller.
    pub async fn get(&self, url: &Url) -> Result<PageResponse, FetchError> {
        debug!("GET {}", url);

        let response = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(PageResponse {
            status: response.status(),
            content_type,
            response,
        })
    }
}
