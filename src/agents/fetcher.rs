use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};

use super::json_ld::extract_recipe;
use crate::config::ScrapingSettings;
use crate::error::ScrapeError;
use crate::model::RawPage;

/// Turns a URL into a raw recipe page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage, ScrapeError>;
}

/// Fetches pages over HTTP and reads the schema.org Recipe from their JSON-LD.
pub struct HttpFetcher {
    client: Client,
    max_content_length: usize,
}

impl HttpFetcher {
    pub fn new(settings: &ScrapingSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_content_length: settings.max_content_length,
        })
    }

    fn too_large(&self, size: usize) -> ScrapeError {
        ScrapeError::ContentTooLarge {
            size,
            limit: self.max_content_length,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> ScrapeError {
    if err.is_timeout() {
        ScrapeError::Timeout
    } else {
        ScrapeError::Network(err.to_string())
    }
}

fn map_status(status: StatusCode) -> ScrapeError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ScrapeError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ScrapeError::Network(format!("HTTP {}", status)),
        s if s.is_server_error() => ScrapeError::Network(format!("HTTP {}", s)),
        s => ScrapeError::UnsupportedSite(format!("HTTP {}", s)),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, ScrapeError> {
        let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::InvalidUrl(format!(
                "{url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_length {
                return Err(self.too_large(length as usize));
            }
        }

        // Read in chunks so an oversized body without a Content-Length header
        // is cut off early.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_content_length {
                return Err(self.too_large(body.len()));
            }
        }
        debug!("Fetched {} bytes from {}", body.len(), url);

        let html = String::from_utf8_lossy(&body);
        let mut page = extract_recipe(&html, url).ok_or_else(|| {
            ScrapeError::UnsupportedSite(format!("no schema.org Recipe found at {url}"))
        })?;
        page.content_length = body.len();
        Ok(page)
    }
}
