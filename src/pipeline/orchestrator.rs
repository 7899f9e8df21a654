use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::CrawlConfig;
use crate::database::{self, DbPool, StoredPage};
use crate::models::{Business, BusinessCrawlSummary, PipelineReport, Result};
use crate::pipeline::crawler::{normalize_homepage_url, SiteCrawler};
use crate::pipeline::fetcher::Fetcher;
use crate::pipeline::pagespeed::PageSpeedClient;
use crate::pipeline::processor::PageProcessor;
use crate::pipeline::social;
use crate::pipeline::types::{FetchedPage, PageMetrics, ProcessedPage};

/// Drives the crawl across businesses: URL discovery, dedup against
/// persisted rows, bounded-concurrency page processing, upsert persistence.
pub struct Pipeline {
    db_pool: DbPool,
    fetcher: Arc<dyn Fetcher>,
    pagespeed: Arc<PageSpeedClient>,
    config: CrawlConfig,
    cancel: Arc<AtomicBool>,
}

#[derive(Clone)]
struct BusinessContext {
    db_pool: DbPool,
    fetcher: Arc<dyn Fetcher>,
    pagespeed: Arc<PageSpeedClient>,
    fetch_gate: Arc<Semaphore>,
    config: CrawlConfig,
}

impl Pipeline {
    pub fn new(
        db_pool: DbPool,
        fetcher: Arc<dyn Fetcher>,
        pagespeed: Arc<PageSpeedClient>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            db_pool,
            fetcher,
            pagespeed,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Checked between businesses: in-flight businesses finish, no new ones
    /// start. Partial per-page persistence is valid state, so there is no
    /// mid-business abort.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn run(&self, businesses: Vec<Business>, force_refresh: bool) -> PipelineReport {
        let run_id = Uuid::new_v4().to_string();
        info!(
            "🚀 Starting crawl run {} for {} businesses (force_refresh={})",
            run_id,
            businesses.len(),
            force_refresh
        );

        let business_gate = Arc::new(Semaphore::new(self.config.max_concurrent_businesses.max(1)));
        let fetch_gate = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));

        let mut tasks: JoinSet<BusinessCrawlSummary> = JoinSet::new();
        let mut summaries = Vec::new();

        for business in businesses {
            if self.cancel.load(Ordering::SeqCst) {
                info!("🛑 Cancellation requested, not starting further businesses");
                break;
            }

            let permit = match business_gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let ctx = BusinessContext {
                db_pool: self.db_pool.clone(),
                fetcher: self.fetcher.clone(),
                pagespeed: self.pagespeed.clone(),
                fetch_gate: fetch_gate.clone(),
                config: self.config.clone(),
            };

            tasks.spawn(async move {
                let _permit = permit;
                crawl_business(ctx, business, force_refresh).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(summary) => {
                    info!(
                        "✅ {}: {} attempted, {} ok, {} degraded{}",
                        summary.business_name,
                        summary.pages_attempted,
                        summary.pages_succeeded,
                        summary.pages_degraded,
                        summary
                            .error
                            .as_deref()
                            .map(|e| format!(" ({})", e))
                            .unwrap_or_default()
                    );
                    summaries.push(summary);
                }
                Err(e) => error!("💥 Business crawl task panicked: {}", e),
            }
        }

        let report = PipelineReport {
            run_id,
            businesses: summaries,
        };
        info!(
            "🏁 Crawl run {} complete: {} pages stored, {} degraded",
            report.run_id,
            report.total_pages_succeeded(),
            report.total_pages_degraded()
        );
        report
    }
}

async fn crawl_business(
    ctx: BusinessContext,
    business: Business,
    force_refresh: bool,
) -> BusinessCrawlSummary {
    let Some(website) = business.website.clone() else {
        return BusinessCrawlSummary::failed(&business, "no website on record".to_string());
    };

    let homepage = normalize_homepage_url(&website);
    let domain = Url::parse(&homepage)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    // Discover candidate URLs from the homepage. A dead homepage still
    // leaves the root as a candidate so the business ends up with a row.
    let crawler = SiteCrawler::new(ctx.config.max_pages_per_site);
    let candidates = {
        let homepage_fetch = {
            let _permit = ctx.fetch_gate.acquire().await;
            fetch_with_retries(ctx.fetcher.as_ref(), &ctx.config, &homepage).await
        };
        match homepage_fetch {
            Ok(page) => crawler.discover(&homepage, &page.body),
            Err(e) => {
                warn!("⚠️ Homepage fetch failed for {} ({}): {}", business.name, homepage, e);
                vec![homepage.clone()]
            }
        }
    };

    let already = if force_refresh {
        HashSet::new()
    } else {
        match database::crawled_urls(&ctx.db_pool, &business.id).await {
            Ok(urls) => urls,
            Err(e) => {
                return BusinessCrawlSummary::failed(
                    &business,
                    format!("store read failed: {}", e),
                )
            }
        }
    };

    // The target set is deduplicated here, so no two page tasks ever write
    // the same (business, url) key.
    let targets: Vec<String> = candidates
        .into_iter()
        .filter(|url| !already.contains(url))
        .collect();

    if targets.is_empty() {
        debug!("⏭️  {}: all discovered pages already crawled", business.name);
        return BusinessCrawlSummary {
            business_id: business.id.clone(),
            business_name: business.name.clone(),
            pages_attempted: 0,
            pages_succeeded: 0,
            pages_degraded: 0,
            error: None,
        };
    }

    let processor = Arc::new(PageProcessor::new(&domain));
    let mut page_tasks: JoinSet<(ProcessedPage, PageMetrics, bool)> = JoinSet::new();

    for url in targets.iter().cloned() {
        let ctx = ctx.clone();
        let processor = processor.clone();
        page_tasks.spawn(async move { process_url(&ctx, &processor, &url).await });
    }

    let mut summary = BusinessCrawlSummary {
        business_id: business.id.clone(),
        business_name: business.name.clone(),
        pages_attempted: targets.len(),
        pages_succeeded: 0,
        pages_degraded: 0,
        error: None,
    };

    while let Some(joined) = page_tasks.join_next().await {
        let (processed, metrics, degraded) = match joined {
            Ok(result) => result,
            Err(e) => {
                error!("💥 Page task panicked for {}: {}", business.name, e);
                continue;
            }
        };

        let row = to_stored_page(&business.id, &processed, &metrics);
        if let Err(e) = database::upsert_business_page(&ctx.db_pool, &row).await {
            // Persistence loss is fatal to this business's crawl step; other
            // businesses keep running.
            error!("🔥 Persistence failed for {} {}: {}", business.id, row.url, e);
            summary.error = Some(format!("persistence failed: {}", e));
            break;
        }

        if degraded {
            summary.pages_degraded += 1;
        } else {
            summary.pages_succeeded += 1;
        }
    }

    summary
}

async fn process_url(
    ctx: &BusinessContext,
    processor: &PageProcessor,
    url: &str,
) -> (ProcessedPage, PageMetrics, bool) {
    let fetched = {
        let _permit = ctx.fetch_gate.acquire().await;
        fetch_with_retries(ctx.fetcher.as_ref(), &ctx.config, url).await
    };

    match fetched {
        Ok(page) => {
            let metrics = ctx.pagespeed.analyze_page(url).await;
            let processed = processor.process(&page);
            (processed, metrics, false)
        }
        Err(e) => {
            warn!("⚠️ Giving up on {} after retries: {}", url, e);
            (ProcessedPage::degraded(url), PageMetrics::default(), true)
        }
    }
}

async fn fetch_with_retries(
    fetcher: &dyn Fetcher,
    config: &CrawlConfig,
    url: &str,
) -> Result<FetchedPage> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) => {
                attempt += 1;
                if attempt > config.retry_attempts {
                    return Err(e);
                }
                let base = config
                    .retry_base_delay_ms
                    .saturating_mul(1u64 << (attempt - 1).min(8));
                let jitter = fastrand::u64(0..=config.retry_base_delay_ms.max(1) / 2 + 1);
                debug!(
                    "🔁 Retry {}/{} for {} in {}ms",
                    attempt,
                    config.retry_attempts,
                    url,
                    base + jitter
                );
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }
        }
    }
}

fn to_stored_page(business_id: &str, processed: &ProcessedPage, metrics: &PageMetrics) -> StoredPage {
    let social_links = if processed.social_links.is_empty() {
        None
    } else {
        Some(social::serialize_links(&processed.social_links))
    };

    StoredPage {
        id: None,
        business_id: business_id.to_string(),
        url: processed.url.clone(),
        page_type: processed.page_type.as_str().to_string(),
        summary: if processed.summary.is_empty() {
            None
        } else {
            Some(processed.summary.clone())
        },
        email: processed.email.clone(),
        social_links,
        page_speed_score: metrics.page_speed_score,
        time_to_interactive_ms: metrics.time_to_interactive_ms,
        crawled_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
