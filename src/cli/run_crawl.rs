use dialoguer::{theme::ColorfulTheme, Confirm};
use std::sync::Arc;

use crate::database;
use crate::models::{CliApp, PipelineReport};
use crate::pipeline::{HttpFetcher, PageSpeedClient, Pipeline};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    pub async fn run_crawl(&self) -> Result<()> {
        let force_refresh = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Force refresh pages that were already crawled?")
            .default(self.config.crawl.force_refresh)
            .interact()?;

        let report = self.crawl_all(force_refresh).await?;
        self.print_crawl_summary(&report);
        Ok(())
    }

    /// Crawl every business with a website on record.
    pub async fn crawl_all(&self, force_refresh: bool) -> Result<PipelineReport> {
        let businesses = database::list_businesses(&self.db_pool).await?;
        let crawlable: Vec<_> = businesses
            .into_iter()
            .filter(|b| b.website.is_some())
            .collect();

        println!("\n🕷️  Crawling {} business websites", crawlable.len());

        let pipeline = Pipeline::new(
            self.db_pool.clone(),
            Arc::new(HttpFetcher::new(self.config.crawl.fetch_timeout_seconds)),
            Arc::new(PageSpeedClient::from_env()),
            self.config.crawl.clone(),
        );

        Ok(pipeline.run(crawlable, force_refresh).await)
    }

    pub fn print_crawl_summary(&self, report: &PipelineReport) {
        println!("\n📊 Crawl run {}", report.run_id);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for summary in &report.businesses {
            match &summary.error {
                Some(error) => println!("  ❌ {}: {}", summary.business_name, error),
                None => println!(
                    "  ✅ {}: {} attempted, {} ok, {} degraded",
                    summary.business_name,
                    summary.pages_attempted,
                    summary.pages_succeeded,
                    summary.pages_degraded
                ),
            }
        }
        println!(
            "  Σ {} pages stored, {} degraded",
            report.total_pages_succeeded(),
            report.total_pages_degraded()
        );
    }
}
