use dialoguer::{theme::ColorfulTheme, Select};

use crate::{
    cli::cli::MenuAction,
    models::{CliApp, Result},
};
use tracing::error;

impl CliApp {
    pub async fn run(&self) -> Result<()> {
        println!("\n🏙️  Welcome to Business Enricher!");
        println!("═══════════════════════════════════════");

        // Show initial stats
        self.show_database_stats().await?;

        loop {
            let actions = vec![
                MenuAction::ImportBusinesses,
                MenuAction::RunCrawl,
                MenuAction::CompileReports,
                MenuAction::PublishReports,
                MenuAction::FullPipeline,
                MenuAction::ShowStats,
                MenuAction::Exit,
            ];

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("\nSelect an action")
                .default(4) // Default to full pipeline
                .items(&actions)
                .interact()?;

            match &actions[selection] {
                MenuAction::ImportBusinesses => {
                    if let Err(e) = self.run_import().await {
                        error!("Import failed: {}", e);
                    }
                }
                MenuAction::RunCrawl => {
                    if let Err(e) = self.run_crawl().await {
                        error!("Crawl failed: {}", e);
                    }
                }
                MenuAction::CompileReports => {
                    if let Err(e) = self.run_reports().await {
                        error!("Report compilation failed: {}", e);
                    }
                }
                MenuAction::PublishReports => {
                    if let Err(e) = self.run_publish().await {
                        error!("Publish failed: {}", e);
                    }
                }
                MenuAction::FullPipeline => {
                    if let Err(e) = self.run_full_pipeline().await {
                        error!("Pipeline failed: {}", e);
                    }
                }
                MenuAction::ShowStats => {
                    if let Err(e) = self.show_database_stats().await {
                        error!("Failed to show stats: {}", e);
                    }
                }
                MenuAction::Exit => {
                    println!("\n👋 Thanks for using Business Enricher!");
                    break;
                }
            }
        }

        Ok(())
    }
}
