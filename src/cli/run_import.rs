use crate::ingest;
use crate::models::CliApp;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    pub async fn run_import(&self) -> Result<()> {
        println!("\n📥 Importing businesses");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📄 Seed file: {}", self.config.ingest.seed_file);

        let (imported, skipped) = ingest::import_seed_file(
            &self.db_pool,
            &self.config.ingest.seed_file,
            self.config.ingest.refresh_max_age_hours,
        )
        .await?;

        println!("✅ {} businesses imported, {} skipped (recently refreshed)", imported, skipped);
        Ok(())
    }
}
