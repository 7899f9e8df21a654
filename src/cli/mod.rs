pub mod cli;
pub mod run;
pub mod run_crawl;
pub mod run_full_pipeline;
pub mod run_import;
pub mod run_publish;
pub mod run_reports;
pub mod show_stats;
