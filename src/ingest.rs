use serde::Deserialize;
use tracing::{info, warn};

use crate::database::{self, DbPool};
use crate::models::{Business, Result};

/// A raw record as exported from the external directory API. Only `id`,
/// `name` and `website` matter to the enrichment core; the rest is carried
/// for the report header.
#[derive(Debug, Deserialize)]
pub struct DirectoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub location: Option<DirectoryLocation>,
    #[serde(default)]
    pub categories: Vec<DirectoryCategory>,
    #[serde(default)]
    pub crm_lead_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DirectoryLocation {
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryCategory {
    pub title: String,
}

/// Join category titles preserving order, dropping duplicates.
fn resolve_categories(categories: &[DirectoryCategory]) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    let titles: Vec<&str> = categories
        .iter()
        .map(|c| c.title.as_str())
        .filter(|title| !title.is_empty() && seen.insert(title.to_string()))
        .collect();

    if titles.is_empty() {
        None
    } else {
        Some(titles.join(", "))
    }
}

pub fn normalize_record(record: DirectoryRecord) -> Business {
    let location = record.location.unwrap_or_default();
    Business {
        id: record.id,
        name: record.name,
        website: record.website.filter(|w| !w.is_empty()),
        address: location.address1,
        city: location.city,
        state: location.state,
        zip_code: location.zip_code,
        phone: record.phone,
        rating: record.rating,
        review_count: record.review_count,
        categories: resolve_categories(&record.categories),
        crm_lead_id: record.crm_lead_id,
    }
}

/// Import a JSON seed file of directory records into the businesses table.
/// Businesses refreshed within `refresh_max_age_hours` are skipped. Returns
/// (imported, skipped).
pub async fn import_seed_file(
    pool: &DbPool,
    path: &str,
    refresh_max_age_hours: i64,
) -> Result<(usize, usize)> {
    let content = tokio::fs::read_to_string(path).await?;
    let records: Vec<DirectoryRecord> = serde_json::from_str(&content)?;
    info!("📥 Importing {} directory records from {}", records.len(), path);

    let mut imported = 0;
    let mut skipped = 0;

    for record in records {
        let business_id = record.id.clone();
        if database::business_recently_updated(pool, &business_id, refresh_max_age_hours).await? {
            info!("⏭️  Skipping {}: refreshed within last {}h", business_id, refresh_max_age_hours);
            skipped += 1;
            continue;
        }

        let business = normalize_record(record);
        if business.website.is_none() {
            warn!("Business {} has no website, it will not be crawled", business.id);
        }
        database::upsert_business(pool, &business).await?;
        imported += 1;
    }

    info!("✓ Seed import done: {} imported, {} skipped", imported, skipped);
    Ok((imported, skipped))
}
