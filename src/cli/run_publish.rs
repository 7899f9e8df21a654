use crate::crm::{HttpCrmClient, PublishOutcome, ReportPublisher};
use crate::models::{Business, CliApp};
use crate::report::CompiledReport;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    pub async fn run_publish(&self) -> Result<()> {
        let compiled = self.compile_all().await?;
        let outcomes = self.publish_compiled(&compiled).await?;

        println!("\n📤 CRM publication");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (business, outcome) in &outcomes {
            let icon = match outcome {
                PublishOutcome::Uploaded(_) => "✅",
                PublishOutcome::AlreadyPresent => "📎",
                PublishOutcome::Failed(_) => "❌",
            };
            println!("  {} {}: {}", icon, business.name, outcome);
        }
        Ok(())
    }

    /// Publish every successfully compiled report. Failures are recorded
    /// per business; one lead's CRM error never blocks another's upload.
    pub async fn publish_compiled(
        &self,
        compiled: &[(Business, Result<CompiledReport>)],
    ) -> Result<Vec<(Business, PublishOutcome)>> {
        let crm = HttpCrmClient::from_env()?;
        let publisher = ReportPublisher::new(&crm);

        let mut outcomes = Vec::new();
        for (business, report) in compiled {
            let outcome = match report {
                Ok(report) => publisher.publish(business, report).await,
                Err(e) => PublishOutcome::Failed(format!("no report artifact: {}", e)),
            };
            outcomes.push((business.clone(), outcome));
        }
        Ok(outcomes)
    }
}
