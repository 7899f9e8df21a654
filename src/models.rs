use serde::{Deserialize, Serialize};

use crate::{config::Config, database::DbPool};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A directory-sourced establishment. `id` comes from the external directory
/// API and never changes; the remaining fields are refreshed on re-ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub categories: Option<String>,
    pub crm_lead_id: Option<String>,
}

/// Per-business crawl outcome, reported at the end of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessCrawlSummary {
    pub business_id: String,
    pub business_name: String,
    pub pages_attempted: usize,
    pub pages_succeeded: usize,
    pub pages_degraded: usize,
    /// Set when the crawl step itself failed (e.g. persistence loss),
    /// as opposed to individual pages degrading.
    pub error: Option<String>,
}

impl BusinessCrawlSummary {
    pub fn failed(business: &Business, error: String) -> Self {
        Self {
            business_id: business.id.clone(),
            business_name: business.name.clone(),
            pages_attempted: 0,
            pages_succeeded: 0,
            pages_degraded: 0,
            error: Some(error),
        }
    }
}

/// Outcome of one full pipeline run across all businesses.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub businesses: Vec<BusinessCrawlSummary>,
}

impl PipelineReport {
    pub fn total_pages_succeeded(&self) -> usize {
        self.businesses.iter().map(|b| b.pages_succeeded).sum()
    }

    pub fn total_pages_degraded(&self) -> usize {
        self.businesses.iter().map(|b| b.pages_degraded).sum()
    }
}

pub struct CliApp {
    pub config: Config,
    pub db_pool: DbPool,
}
