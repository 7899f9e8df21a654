pub mod crawler;
pub mod fetcher;
pub mod orchestrator;
pub mod pagespeed;
pub mod processor;
pub mod social;
pub mod types;

// Re-export the main types for easy importing
pub use fetcher::{Fetcher, HttpFetcher};
pub use orchestrator::Pipeline;
pub use pagespeed::PageSpeedClient;
pub use types::{FetchedPage, PageMetrics, PageType, ProcessedPage};
