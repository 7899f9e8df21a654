use serde::{Deserialize, Serialize};

use crate::pipeline::social::SocialLink;

/// Closed classification of a page's role on a business website. Pages that
/// match no rule are `Other` -- never empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Home,
    Contact,
    Menu,
    About,
    #[default]
    Other,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Home => "Home",
            PageType::Contact => "Contact",
            PageType::Menu => "Menu",
            PageType::About => "About",
            PageType::Other => "Other",
        }
    }

    pub fn from_stored(value: &str) -> Self {
        match value {
            "Home" => PageType::Home,
            "Contact" => PageType::Contact,
            "Menu" => PageType::Menu,
            "About" => PageType::About,
            _ => PageType::Other,
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw fetch output for a single URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub fetched_in_ms: u64,
}

/// Performance measurement for a page. Both fields stay `None` when the
/// measurement step fails; that is a valid result, not an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageMetrics {
    pub page_speed_score: Option<i64>,
    pub time_to_interactive_ms: Option<i64>,
}

/// Classification and extraction result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedPage {
    pub url: String,
    pub page_type: PageType,
    pub summary: String,
    pub email: Option<String>,
    pub social_links: Vec<SocialLink>,
}

impl ProcessedPage {
    /// Minimal valid record for a page that could not be fetched or parsed.
    pub fn degraded(url: &str) -> Self {
        Self {
            url: url.to_string(),
            page_type: PageType::Other,
            summary: String::new(),
            email: None,
            social_links: Vec::new(),
        }
    }
}
