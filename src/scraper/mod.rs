pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::{DatasetConfig, ScraperConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use self::cleaner::is_image_content_type;
use self::http_client::HttpClient;

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Why a station yields no data for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NonTextPayload(String),
    Status(u16),
    RetriesExhausted(u32),
    DeadlineExceeded,
    Aborted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonTextPayload(ct) => write!(f, "response is not text ({})", ct),
            SkipReason::Status(code) => write!(f, "server answered HTTP {}", code),
            SkipReason::RetriesExhausted(n) => write!(f, "gave up after {} attempts", n),
            SkipReason::DeadlineExceeded => write!(f, "run deadline reached"),
            SkipReason::Aborted => write!(f, "fetch task aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Skip(SkipReason),
}

impl Outcome {
    /// Page body, or the empty string for a skipped station.
    pub fn into_content(self) -> String {
        match self {
            Outcome::Success(body) => body,
            Outcome::Skip(_) => String::new(),
        }
    }
}

/// Transient failures. Every variant is worth another attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable station page source.
#[async_trait]
pub trait StationSource: Send + Sync {
    async fn fetch(&self, station_id: &str) -> Result<Outcome, FetchError>;
}

// ── Classification ────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Read,
    Skip(SkipReason),
    Retry,
}

/// Decide what a response means for this dataset, before reading its body.
pub fn classify(status: StatusCode, content_type: Option<&str>, dataset: &DatasetConfig) -> Verdict {
    if !status.is_success() {
        if dataset.skip_statuses.contains(&status.as_u16()) {
            return Verdict::Skip(SkipReason::Status(status.as_u16()));
        }
        return Verdict::Retry;
    }

    match content_type {
        Some(ct) if dataset.skip_on_image && is_image_content_type(ct) => {
            Verdict::Skip(SkipReason::NonTextPayload(ct.to_string()))
        }
        _ => Verdict::Read,
    }
}

// ── SIR scraper ───────────────────────────────────────────────────────────────

pub struct SirScraper {
    client: HttpClient,
    base_url: Url,
    dataset: DatasetConfig,
}

impl SirScraper {
    pub fn new(config: &ScraperConfig, dataset: DatasetConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid scraper base_url {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
            dataset,
        })
    }

    /// e.g. TOS01000001 → dettaglio.php?id=TOS01000001&title=&type=pluvio_men
    pub fn station_url(&self, station_id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("id", station_id)
            .append_pair("title", "")
            .append_pair("type", &self.dataset.measurement_type);
        url
    }
}

#[async_trait]
impl StationSource for SirScraper {
    async fn fetch(&self, station_id: &str) -> Result<Outcome, FetchError> {
        let url = self.station_url(station_id);
        let page = self.client.get(&url).await?;

        match classify(page.status, page.content_type.as_deref(), &self.dataset) {
            Verdict::Read => {
                let body = page.text(&url).await?;
                debug!("{}: {} bytes", station_id, body.len());
                Ok(Outcome::Success(body))
            }
            Verdict::Skip(reason) => {
                warn!("{}: skipping, {}", station_id, reason);
                Ok(Outcome::Skip(reason))
            }
            Verdict::Retry => Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            }),
        }
    }
}
