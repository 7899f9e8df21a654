use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::Result;
use crate::pipeline::types::FetchedPage;

/// Seam over page retrieval so the orchestrator can run against a stub.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; BusinessEnricher/1.0)")
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching: {}", url);
        let start = Instant::now();

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error: {}", status).into());
        }

        let body = response.text().await?;
        let fetched_in_ms = start.elapsed().as_millis() as u64;
        debug!("Fetched {} bytes from {} in {}ms", body.len(), url, fetched_in_ms);

        Ok(FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            body,
            fetched_in_ms,
        })
    }
}
