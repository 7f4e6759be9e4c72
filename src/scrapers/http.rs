use crate::error::CrawlError;
use crate::scrapers::traits::Fetcher;
use crate::scrapers::types::{FetchOutcome, RenderedDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Plain HTTP fetcher for sources that serve listings without JavaScript
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher with a desktop browser user agent
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<RenderedDocument> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "vi-VN,vi;q=0.9,en;q=0.8")
            .send()
            .await
            .context("Request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Unexpected status {}", response.status());
        }

        let final_url = response.url().to_string();
        let html = response.text().await.context("Failed to read response body")?;
        debug!(url, bytes = html.len(), "Downloaded page");

        Ok(RenderedDocument::new(final_url, html))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_one(&self, url: &str) -> FetchOutcome {
        match self.get(url).await {
            Ok(document) => FetchOutcome::success(document),
            Err(e) => {
                warn!(url, error = %format!("{e:#}"), "Fetch failed");
                FetchOutcome::failure(url, format!("{e:#}"))
            }
        }
    }

    async fn fetch_many(
        &self,
        urls: &[String],
        concurrency: usize,
    ) -> Result<Vec<FetchOutcome>, CrawlError> {
        let outcomes = stream::iter(urls.to_vec())
            .map(|url| async move { self.fetch_one(&url).await })
            .buffered(concurrency.max(1))
            .collect::<Vec<FetchOutcome>>()
            .await;
        Ok(outcomes)
    }
}
