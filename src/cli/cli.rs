use crate::config::Config;
use crate::database::DbPool;
use crate::models::{CliApp, Result};

#[derive(Debug, Clone)]
pub enum MenuAction {
    ImportBusinesses,
    RunCrawl,
    CompileReports,
    PublishReports,
    FullPipeline,
    ShowStats,
    Exit,
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuAction::ImportBusinesses => {
                write!(f, "📥 Import businesses from directory seed file")
            }
            MenuAction::RunCrawl => write!(f, "🕷️  Crawl business websites"),
            MenuAction::CompileReports => write!(f, "📄 Compile website reports"),
            MenuAction::PublishReports => write!(f, "📤 Publish reports to CRM leads"),
            MenuAction::FullPipeline => {
                write!(f, "🚀 Full pipeline (crawl, compile, publish)")
            }
            MenuAction::ShowStats => write!(f, "📊 Show database statistics"),
            MenuAction::Exit => write!(f, "🚪 Exit"),
        }
    }
}

impl CliApp {
    pub async fn new(config: Config, db_pool: DbPool) -> Result<Self> {
        Ok(Self { config, db_pool })
    }
}
