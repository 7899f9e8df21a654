use std::collections::HashMap;

use crate::crm::PublishOutcome;
use crate::models::CliApp;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    /// Crawl, compile and publish in sequence, then print the end-of-run
    /// summary enumerating every business's outcome.
    pub async fn run_full_pipeline(&self) -> Result<()> {
        println!("\n🚀 Full enrichment pipeline");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let crawl_report = self.crawl_all(self.config.crawl.force_refresh).await?;
        let compiled = self.compile_all().await?;
        let publish_outcomes = match self.publish_compiled(&compiled).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                // Typically missing CRM credentials; crawl and reports are
                // still done, so summarize what we have.
                println!("⚠️  Publishing skipped: {}", e);
                Vec::new()
            }
        };

        let crawl_by_id: HashMap<&str, _> = crawl_report
            .businesses
            .iter()
            .map(|s| (s.business_id.as_str(), s))
            .collect();
        let publish_by_id: HashMap<&str, &PublishOutcome> = publish_outcomes
            .iter()
            .map(|(b, outcome)| (b.id.as_str(), outcome))
            .collect();

        println!("\n🏁 End-of-run summary");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (business, report) in &compiled {
            let crawl_part = match crawl_by_id.get(business.id.as_str()) {
                Some(summary) if summary.error.is_some() => {
                    format!("crawl failed ({})", summary.error.as_deref().unwrap_or(""))
                }
                Some(summary) => format!(
                    "{} ok / {} degraded",
                    summary.pages_succeeded, summary.pages_degraded
                ),
                None => "not crawled".to_string(),
            };

            let report_part = match report {
                Ok(r) if r.complete => "report written".to_string(),
                Ok(_) => "report written (low confidence)".to_string(),
                Err(e) => format!("report failed ({})", e),
            };

            let publish_part = publish_by_id
                .get(business.id.as_str())
                .map(|outcome| outcome.to_string())
                .unwrap_or_else(|| "not published".to_string());

            println!(
                "  • {} [{}]: {}; {}; {}",
                business.name, business.id, crawl_part, report_part, publish_part
            );
        }

        Ok(())
    }
}
