use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::Result;
use crate::pipeline::types::PageMetrics;

const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// PageSpeed Insights wrapper. Without an API key, or on any request or
/// parse failure, measurement degrades to empty metrics -- a page is never
/// lost because its measurement failed.
pub struct PageSpeedClient {
    client: Client,
    api_key: Option<String>,
}

impl PageSpeedClient {
    pub fn from_env() -> Self {
        let api_key = std::env::var("PAGESPEED_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("No PAGESPEED_API_KEY found, performance metrics will be empty");
        }

        let client = Client::builder()
            // Lighthouse runs take a while on the API side.
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, api_key }
    }

    /// Measurement disabled; every page gets empty metrics.
    pub fn disabled() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key: None }
    }

    pub async fn analyze_page(&self, url: &str) -> PageMetrics {
        let Some(key) = &self.api_key else {
            return PageMetrics::default();
        };

        match self.request(url, key).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("⚠️ PageSpeed measurement failed for {}: {}", url, e);
                PageMetrics::default()
            }
        }
    }

    async fn request(&self, url: &str, key: &str) -> Result<PageMetrics> {
        let response = self
            .client
            .get(PAGESPEED_ENDPOINT)
            .query(&[("url", url), ("strategy", "desktop"), ("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()).into());
        }

        let data: serde_json::Value = response.json().await?;

        let page_speed_score = data
            .pointer("/lighthouseResult/categories/performance/score")
            .and_then(|v| v.as_f64())
            .map(|score| (score * 100.0).round() as i64);

        let time_to_interactive_ms = data
            .pointer("/lighthouseResult/audits/interactive/numericValue")
            .and_then(|v| v.as_f64())
            .map(|v| v as i64);

        debug!(
            "PageSpeed for {}: score={:?} tti={:?}ms",
            url, page_speed_score, time_to_interactive_ms
        );

        Ok(PageMetrics {
            page_speed_score,
            time_to_interactive_ms,
        })
    }
}
