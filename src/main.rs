use business_enricher::config::{load_config, Config};
use business_enricher::database::create_db_pool;
use business_enricher::models::{CliApp, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = match load_config("config.yml").await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config.yml: {}. Using defaults.", e);
            Config::default()
        }
    };

    // Setup logging
    std::env::set_var(
        "RUST_LOG",
        format!(
            "business_enricher={},hyper=warn,reqwest=warn",
            config.logging.level
        ),
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("business_enricher=info".parse().unwrap()),
        )
        .with_max_level(tracing::Level::INFO)
        .init();

    // Create reports directory
    tokio::fs::create_dir_all(&config.reports.directory).await?;

    // Initialize database
    info!("Initializing database...");
    let db_pool = create_db_pool("data/businesses.db").await?;

    // Initialize and run CLI app
    let app = CliApp::new(config, db_pool).await?;

    // Add graceful shutdown
    tokio::select! {
        result = app.run() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
