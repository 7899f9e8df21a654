use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::pipeline::social::{self, SocialLink};
use crate::pipeline::types::{FetchedPage, PageType, ProcessedPage};

const SUMMARY_MAX_CHARS: usize = 160;

/// Classifies a fetched page and extracts structured signals: page type,
/// contact email, social profile links, one-line summary. Pure transform;
/// malformed content degrades to a minimal record instead of failing.
pub struct PageProcessor {
    email_regex: Regex,
    business_domain: String,
}

impl PageProcessor {
    pub fn new(business_domain: &str) -> Self {
        Self {
            email_regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
                .unwrap(),
            business_domain: business_domain.trim_start_matches("www.").to_lowercase(),
        }
    }

    pub fn process(&self, page: &FetchedPage) -> ProcessedPage {
        let document = Html::parse_document(&page.body);

        let title = extract_title(&document);
        let clean_text = extract_clean_text(&document);

        ProcessedPage {
            url: page.url.clone(),
            page_type: classify(&page.url, &title),
            summary: summarize(&title, &document, &clean_text),
            email: self.extract_email(&document, &clean_text),
            social_links: extract_social_links(&document),
        }
    }

    /// First well-formed address, mailto targets before visible text,
    /// same-domain addresses before foreign ones. Absence is a valid result.
    fn extract_email(&self, document: &Html, clean_text: &str) -> Option<String> {
        let mut candidates: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        let mailto_selector = Selector::parse(r#"a[href^="mailto:"]"#).unwrap();
        for element in document.select(&mailto_selector) {
            if let Some(href) = element.value().attr("href") {
                let address = href
                    .trim_start_matches("mailto:")
                    .split('?')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_lowercase();
                if self.email_regex.is_match(&address) && seen.insert(address.clone()) {
                    candidates.push(address);
                }
            }
        }

        for m in self.email_regex.find_iter(clean_text) {
            let address = m.as_str().to_lowercase();
            if seen.insert(address.clone()) {
                candidates.push(address);
            }
        }

        if !self.business_domain.is_empty() {
            if let Some(own) = candidates
                .iter()
                .find(|email| email.ends_with(&self.business_domain))
            {
                return Some(own.clone());
            }
        }
        candidates.into_iter().next()
    }
}

/// Ordered rules, path signals before title signals; anything unmatched
/// lands on `Other`.
fn classify(url: &str, title: &str) -> PageType {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    let title = title.to_lowercase();

    if path.is_empty() || path == "/" {
        return PageType::Home;
    }
    if path.contains("contact") {
        return PageType::Contact;
    }
    if path.contains("menu") {
        return PageType::Menu;
    }
    if path.contains("about") || path.contains("our-story") {
        return PageType::About;
    }
    if title.contains("contact") {
        return PageType::Contact;
    }
    if title.contains("menu") {
        return PageType::Menu;
    }
    if title.contains("about") {
        return PageType::About;
    }
    PageType::Other
}

fn extract_title(document: &Html) -> String {
    let title_selector = Selector::parse("title").unwrap();
    document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn extract_clean_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").unwrap();
    document
        .select(&body_selector)
        .next()
        .map(|body| {
            body.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// One-line summary: title, else meta description, else leading body text.
fn summarize(title: &str, document: &Html, clean_text: &str) -> String {
    if !title.is_empty() {
        return title.to_string();
    }

    let meta_selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
    if let Some(description) = document
        .select(&meta_selector)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        return description.to_string();
    }

    clean_text.chars().take(SUMMARY_MAX_CHARS).collect::<String>().trim().to_string()
}

/// Anchor targets matched against the known-platform set; one link per
/// platform, first-seen order preserved.
fn extract_social_links(document: &Html) -> Vec<SocialLink> {
    let link_selector = Selector::parse("a[href]").unwrap();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(platform) = social::platform_for_url(href) {
                if seen.insert(platform) {
                    links.push(SocialLink::new(platform, href));
                }
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(url: &str, body: &str) -> FetchedPage {
        FetchedPage {
            url: url.to_string(),
            status: 200,
            body: body.to_string(),
            fetched_in_ms: 12,
        }
    }

    #[test]
    fn classifies_by_path_then_title() {
        assert_eq!(classify("https://acme.com/", ""), PageType::Home);
        assert_eq!(classify("https://acme.com", ""), PageType::Home);
        assert_eq!(classify("https://acme.com/contact-us", ""), PageType::Contact);
        assert_eq!(classify("https://acme.com/food-menu", ""), PageType::Menu);
        assert_eq!(classify("https://acme.com/about", ""), PageType::About);
        assert_eq!(classify("https://acme.com/team", "About Acme"), PageType::About);
        assert_eq!(classify("https://acme.com/blog", "Latest news"), PageType::Other);
        // Path rules win over title rules.
        assert_eq!(classify("https://acme.com/menu", "Contact"), PageType::Menu);
    }

    #[test]
    fn extracts_first_email_preferring_own_domain() {
        let processor = PageProcessor::new("acme.com");
        let body = r#"
            <html><body>
                <p>Partner with widgets@supplier.io today.</p>
                <a href="mailto:Hello@Acme.com?subject=Hi">Email us</a>
            </body></html>
        "#;

        let result = processor.process(&fetched("https://acme.com/contact", body));
        assert_eq!(result.email.as_deref(), Some("hello@acme.com"));
    }

    #[test]
    fn missing_email_is_not_an_error() {
        let processor = PageProcessor::new("acme.com");
        let result = processor.process(&fetched("https://acme.com/menu", "<p>Pasta</p>"));
        assert_eq!(result.email, None);
        assert_eq!(result.page_type, PageType::Menu);
    }

    #[test]
    fn social_links_dedupe_by_platform_in_first_seen_order() {
        let processor = PageProcessor::new("acme.com");
        let body = r#"
            <html><body>
                <a href="https://facebook.com/a">fb</a>
                <a href="https://instagram.com/b">ig</a>
                <a href="https://facebook.com/a">fb again</a>
            </body></html>
        "#;

        let result = processor.process(&fetched("https://acme.com/", body));
        assert_eq!(
            social::serialize_links(&result.social_links),
            "facebook:https://facebook.com/a,instagram:https://instagram.com/b"
        );
    }

    #[test]
    fn malformed_content_degrades_to_minimal_record() {
        let processor = PageProcessor::new("acme.com");
        let result = processor.process(&fetched("https://acme.com/x", "\u{0}\u{1}<<<>>>"));

        assert_eq!(result.page_type, PageType::Other);
        assert_eq!(result.email, None);
        assert!(result.social_links.is_empty());
    }

    #[test]
    fn summary_falls_back_from_title_to_meta_to_text() {
        let processor = PageProcessor::new("acme.com");

        let titled = processor.process(&fetched(
            "https://acme.com/about",
            "<html><head><title>Our Story</title></head><body>x</body></html>",
        ));
        assert_eq!(titled.summary, "Our Story");

        let meta = processor.process(&fetched(
            "https://acme.com/about",
            r#"<html><head><meta name="description" content="Family owned."></head><body>x</body></html>"#,
        ));
        assert_eq!(meta.summary, "Family owned.");

        let text = processor.process(&fetched(
            "https://acme.com/about",
            "<html><body>Fresh pasta daily</body></html>",
        ));
        assert_eq!(text.summary, "Fresh pasta daily");
    }
}
