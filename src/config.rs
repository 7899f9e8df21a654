use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub reports: ReportConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Hard cap on pages per business website, root page included.
    pub max_pages_per_site: usize,
    /// Global in-flight fetch bound across all businesses.
    pub max_concurrent_fetches: usize,
    pub max_concurrent_businesses: usize,
    pub fetch_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Re-crawl pages that already have a persisted row.
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    pub directory: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    pub seed_file: String,
    /// Skip re-ingesting a business refreshed within this window.
    pub refresh_max_age_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig {
                max_pages_per_site: 20,
                max_concurrent_fetches: 8,
                max_concurrent_businesses: 4,
                fetch_timeout_seconds: 30,
                retry_attempts: 3,
                retry_base_delay_ms: 500,
                force_refresh: false,
            },
            reports: ReportConfig {
                directory: "reports".to_string(),
            },
            ingest: IngestConfig {
                seed_file: "data/businesses.json".to_string(),
                refresh_max_age_hours: 24,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

pub async fn load_config(
    path: &str,
) -> std::result::Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let content = tokio::fs::read_to_string(path).await?;
    let config: Config = serde_yaml::from_str(&content)?;
    Ok(config)
}
