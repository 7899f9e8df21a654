use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Non-HTML static assets skipped during link discovery.
const SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff",
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar",
    ".css", ".js", ".json", ".xml",
];

/// Reduce a URL possibly pointing at a sub-page to its homepage,
/// e.g. `https://acme.com/locations/charlotte/menus` -> `https://acme.com`.
pub fn normalize_homepage_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some() => {
            format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""))
        }
        _ => url.to_string(),
    }
}

/// Depth-1 discovery of a business's own pages: the homepage plus
/// same-domain links found on it, capped at `max_links` total.
pub struct SiteCrawler {
    max_links: usize,
}

impl SiteCrawler {
    pub fn new(max_links: usize) -> Self {
        Self { max_links: max_links.max(1) }
    }

    pub fn discover(&self, homepage: &str, homepage_html: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = vec![homepage.to_string()];
        seen.insert(homepage.to_string());

        let domain = match Url::parse(homepage).ok().and_then(|u| u.host_str().map(str::to_string)) {
            Some(domain) => domain,
            None => return urls,
        };

        let document = Html::parse_document(homepage_html);
        let link_selector = Selector::parse("a[href]").unwrap();

        for element in document.select(&link_selector) {
            if urls.len() >= self.max_links {
                break;
            }

            let Some(href) = element.value().attr("href") else { continue };
            let Some(mut resolved) = resolve_url(href, homepage) else { continue };
            if resolved.host_str() != Some(domain.as_str()) {
                continue;
            }

            resolved.set_fragment(None);
            let cleaned = resolved.to_string();
            if is_static_asset(&cleaned) {
                continue;
            }

            if seen.insert(cleaned.clone()) {
                urls.push(cleaned);
            }
        }

        debug!("Discovered {} URLs on {}", urls.len(), homepage);
        urls
    }
}

fn resolve_url(href: &str, base_url: &str) -> Option<Url> {
    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(_) => Url::parse(base_url).ok()?.join(href).ok(),
    }
}

fn is_static_asset(url: &str) -> bool {
    let lower = url.to_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
