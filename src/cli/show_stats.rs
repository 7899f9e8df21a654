use crate::database::get_database_stats;
use crate::models::CliApp;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl CliApp {
    pub async fn show_database_stats(&self) -> Result<()> {
        let stats = get_database_stats(&self.db_pool).await?;

        println!("\n📊 Database statistics");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("  🏢 Businesses: {}", stats.total_businesses);
        println!("     🌐 with website: {}", stats.businesses_with_website);
        println!("     🧾 with CRM lead: {}", stats.businesses_with_crm_lead);
        println!("  📄 Crawled pages: {}", stats.total_pages);
        println!("     📧 with email: {}", stats.pages_with_email);
        println!("     🔗 with social links: {}", stats.pages_with_social_links);
        if stats.total_pages > 0 {
            println!("     ⚡ avg page speed score: {:.1}", stats.avg_page_speed_score);
        }

        if !stats.pages_by_type.is_empty() {
            println!("  📑 Pages by type:");
            for (page_type, count) in &stats.pages_by_type {
                println!("     {}: {}", page_type, count);
            }
        }

        Ok(())
    }
}
