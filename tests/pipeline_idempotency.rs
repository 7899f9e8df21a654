use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use business_enricher::config::CrawlConfig;
use business_enricher::database::{self, create_db_pool, DbPool};
use business_enricher::models::{Business, Result};
use business_enricher::pipeline::{FetchedPage, Fetcher, PageSpeedClient, Pipeline};

struct StubFetcher {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body: body.clone(),
                fetched_in_ms: 5,
            }),
            None => Err(format!("connection refused: {}", url).into()),
        }
    }
}

struct TimeoutFetcher;

#[async_trait]
impl Fetcher for TimeoutFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        Err(format!("timed out fetching {}", url).into())
    }
}

fn acme_site() -> StubFetcher {
    let mut pages = HashMap::new();
    pages.insert(
        "https://acme.com".to_string(),
        r#"<html><head><title>Acme</title></head><body>
            <a href="/menu">Menu</a>
            <a href="/contact">Contact</a>
            <a href="https://facebook.com/acme">fb</a>
        </body></html>"#
            .to_string(),
    );
    pages.insert(
        "https://acme.com/menu".to_string(),
        "<html><head><title>Menu</title></head><body>Pasta</body></html>".to_string(),
    );
    pages.insert(
        "https://acme.com/contact".to_string(),
        r#"<html><head><title>Contact</title></head><body>
            <a href="mailto:hello@acme.com">Write us</a>
            <a href="https://instagram.com/acme">ig</a>
        </body></html>"#
            .to_string(),
    );
    StubFetcher {
        pages,
        calls: AtomicUsize::new(0),
    }
}

fn crawl_config() -> CrawlConfig {
    CrawlConfig {
        max_pages_per_site: 20,
        max_concurrent_fetches: 4,
        max_concurrent_businesses: 2,
        fetch_timeout_seconds: 5,
        retry_attempts: 1,
        retry_base_delay_ms: 1,
        force_refresh: false,
    }
}

fn acme_business() -> Business {
    Business {
        id: "b1".to_string(),
        name: "Acme".to_string(),
        website: Some("https://acme.com".to_string()),
        address: None,
        city: None,
        state: None,
        zip_code: None,
        phone: None,
        rating: None,
        review_count: None,
        categories: None,
        crm_lead_id: None,
    }
}

async fn test_pool() -> DbPool {
    let path = std::env::temp_dir().join(format!("enricher-pipeline-{}.db", uuid::Uuid::new_v4()));
    create_db_pool(path.to_str().unwrap()).await.unwrap()
}

fn pipeline_with(pool: DbPool, fetcher: Arc<dyn Fetcher>) -> Pipeline {
    Pipeline::new(
        pool,
        fetcher,
        Arc::new(PageSpeedClient::disabled()),
        crawl_config(),
    )
}

#[tokio::test]
async fn rerunning_without_force_refresh_changes_nothing() {
    let pool = test_pool().await;
    let business = acme_business();
    database::upsert_business(&pool, &business).await.unwrap();

    let pipeline = pipeline_with(pool.clone(), Arc::new(acme_site()));

    let first = pipeline.run(vec![business.clone()], false).await;
    assert_eq!(first.businesses.len(), 1);
    assert_eq!(first.businesses[0].pages_attempted, 3);
    assert_eq!(first.businesses[0].pages_succeeded, 3);

    let snapshot = |pages: &[database::StoredPage]| {
        let mut rows: Vec<_> = pages
            .iter()
            .map(|p| {
                (
                    p.url.clone(),
                    p.page_type.clone(),
                    p.summary.clone(),
                    p.email.clone(),
                    p.social_links.clone(),
                )
            })
            .collect();
        rows.sort();
        rows
    };

    let after_first = database::pages_for_business(&pool, "b1").await.unwrap();

    let second = pipeline.run(vec![business], false).await;
    assert_eq!(second.businesses[0].pages_attempted, 0);

    let after_second = database::pages_for_business(&pool, "b1").await.unwrap();
    assert_eq!(after_second.len(), after_first.len());
    assert_eq!(snapshot(&after_second), snapshot(&after_first));
}

#[tokio::test]
async fn extracted_signals_are_persisted() {
    let pool = test_pool().await;
    let business = acme_business();
    database::upsert_business(&pool, &business).await.unwrap();

    let pipeline = pipeline_with(pool.clone(), Arc::new(acme_site()));
    pipeline.run(vec![business], false).await;

    let pages = database::pages_for_business(&pool, "b1").await.unwrap();
    assert_eq!(pages.len(), 3);

    let contact = pages
        .iter()
        .find(|p| p.url == "https://acme.com/contact")
        .unwrap();
    assert_eq!(contact.page_type, "Contact");
    assert_eq!(contact.email.as_deref(), Some("hello@acme.com"));
    assert_eq!(
        contact.social_links.as_deref(),
        Some("instagram:https://instagram.com/acme")
    );

    let home = pages.iter().find(|p| p.url == "https://acme.com").unwrap();
    assert_eq!(home.page_type, "Home");
    assert_eq!(
        home.social_links.as_deref(),
        Some("facebook:https://facebook.com/acme")
    );
}

#[tokio::test]
async fn repeated_timeouts_still_persist_a_degraded_row() {
    let pool = test_pool().await;
    let business = acme_business();
    database::upsert_business(&pool, &business).await.unwrap();

    let pipeline = pipeline_with(pool.clone(), Arc::new(TimeoutFetcher));
    let report = pipeline.run(vec![business], false).await;

    assert_eq!(report.businesses[0].pages_degraded, 1);
    assert_eq!(report.businesses[0].pages_succeeded, 0);
    assert!(report.businesses[0].error.is_none());

    let pages = database::pages_for_business(&pool, "b1").await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].page_type, "Other");
    assert_eq!(pages[0].email, None);
    assert_eq!(pages[0].social_links, None);
}

#[tokio::test]
async fn concurrent_crawls_of_same_urls_yield_single_rows() {
    let pool = test_pool().await;
    let business = acme_business();
    database::upsert_business(&pool, &business).await.unwrap();

    let fetcher: Arc<dyn Fetcher> = Arc::new(acme_site());
    let pipeline_a = pipeline_with(pool.clone(), fetcher.clone());
    let pipeline_b = pipeline_with(pool.clone(), fetcher);

    // Force refresh so both runs really target the same (business, url)
    // keys at the same time.
    let (first, second) = tokio::join!(
        pipeline_a.run(vec![business.clone()], true),
        pipeline_b.run(vec![business], true)
    );
    assert!(first.businesses[0].error.is_none());
    assert!(second.businesses[0].error.is_none());

    let pages = database::pages_for_business(&pool, "b1").await.unwrap();
    let mut urls: Vec<_> = pages.iter().map(|p| p.url.clone()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(pages.len(), urls.len());
    assert_eq!(pages.len(), 3);
}

#[tokio::test]
async fn cancellation_stops_before_starting_new_businesses() {
    let pool = test_pool().await;
    let business = acme_business();
    database::upsert_business(&pool, &business).await.unwrap();

    let pipeline = pipeline_with(pool.clone(), Arc::new(acme_site()));
    pipeline
        .cancel_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let report = pipeline.run(vec![business], false).await;
    assert!(report.businesses.is_empty());

    let pages = database::pages_for_business(&pool, "b1").await.unwrap();
    assert!(pages.is_empty());
}
