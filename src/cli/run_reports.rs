use tracing::error;

use crate::database;
use crate::models::{Business, CliApp};
use crate::report::{CompiledReport, ReportCompiler};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    pub async fn run_reports(&self) -> Result<()> {
        let compiled = self.compile_all().await?;

        println!("\n📄 Report compilation");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (business, outcome) in &compiled {
            match outcome {
                Ok(report) if report.complete => {
                    println!("  ✅ {}: {} ({} pages)", business.name, report.path.display(), report.pages_included)
                }
                Ok(report) => {
                    println!("  ⚠️  {}: {} (no pages, low confidence)", business.name, report.path.display())
                }
                Err(e) => println!("  ❌ {}: {}", business.name, e),
            }
        }
        Ok(())
    }

    /// Compile a report for every business. A filesystem failure on one
    /// business does not stop the rest.
    pub async fn compile_all(
        &self,
    ) -> Result<Vec<(Business, Result<CompiledReport>)>> {
        let businesses = database::list_businesses(&self.db_pool).await?;
        let compiler = ReportCompiler::new(self.db_pool.clone(), &self.config.reports.directory);

        let mut results = Vec::with_capacity(businesses.len());
        for business in businesses {
            let outcome = compiler.compile(&business).await;
            if let Err(e) = &outcome {
                error!("🔥 Report compilation failed for {}: {}", business.id, e);
            }
            results.push((business, outcome));
        }
        Ok(results)
    }
}
