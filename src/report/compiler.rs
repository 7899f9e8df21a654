use base64::Engine;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;
use url::Url;

use crate::database::{self, DbPool, StoredPage};
use crate::models::{Business, Result};
use crate::pipeline::social::{self, SocialLink};
use crate::pipeline::types::PageType;
use crate::report::renderer::{
    display_or_na, escape_html, ms_to_seconds, number_or_na, render_indexed_block, render_template,
};
use crate::report::slug::{folder_name, sanitize_folder_name};

const REPORT_TEMPLATE: &str = include_str!("../../templates/website-report.html");
const REPORT_FILE_NAME: &str = "website-report.html";

// 1x1 transparent GIF used as the header image placeholder.
const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0xf0, 0x00, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// A compiled report artifact on disk. Regenerable at any time; the database
/// stays authoritative.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub business_id: String,
    pub path: PathBuf,
    pub pages_included: usize,
    /// False when the business had no crawled pages at all; the report is
    /// still written, flagged low-confidence.
    pub complete: bool,
}

pub struct ReportCompiler {
    db_pool: DbPool,
    reports_root: PathBuf,
}

impl ReportCompiler {
    pub fn new(db_pool: DbPool, reports_root: impl Into<PathBuf>) -> Self {
        Self {
            db_pool,
            reports_root: reports_root.into(),
        }
    }

    /// Compile the report for one business from its persisted pages and
    /// write it to the deterministic per-business location, overwriting any
    /// previous artifact there.
    pub async fn compile(&self, business: &Business) -> Result<CompiledReport> {
        let pages = database::pages_for_business(&self.db_pool, &business.id).await?;

        let folder = self.folder_for(business).await?;
        let dir = self.reports_root.join(&folder);
        tokio::fs::create_dir_all(&dir).await?;

        let complete = !pages.is_empty();
        let html = render_report(business, &pages, complete);

        let path = dir.join(REPORT_FILE_NAME);
        tokio::fs::write(&path, html).await?;
        info!("📄 Report written for {}: {}", business.name, path.display());

        Ok(CompiledReport {
            business_id: business.id.clone(),
            path,
            pages_included: pages.len(),
            complete,
        })
    }

    /// First business (in ingestion order) to claim a normalized name keeps
    /// the bare folder; later twins are suffixed with their id.
    async fn folder_for(&self, business: &Business) -> Result<String> {
        let slug = sanitize_folder_name(&business.name);
        let all = database::list_businesses(&self.db_pool).await?;
        let first_owner = all
            .iter()
            .find(|b| sanitize_folder_name(&b.name) == slug);
        let has_earlier_twin = first_owner.map(|b| b.id != business.id).unwrap_or(false);
        Ok(folder_name(&business.name, &business.id, has_earlier_twin))
    }
}

/// Consolidated social links across all pages: one link per platform, first
/// crawled occurrence wins.
fn consolidate_social_links(pages: &[StoredPage]) -> Vec<SocialLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for page in pages {
        let Some(raw) = page.social_links.as_deref() else { continue };
        for link in social::parse_links(raw) {
            if seen.insert(link.platform.clone()) {
                links.push(link);
            }
        }
    }
    links
}

/// Representative contact email: first non-empty, preferring Contact pages,
/// then Home, then everything else in crawl order.
fn representative_email(pages: &[StoredPage]) -> Option<String> {
    let rank = |page_type: &str| match PageType::from_stored(page_type) {
        PageType::Contact => 0,
        PageType::Home => 1,
        _ => 2,
    };

    let mut candidates: Vec<&StoredPage> = pages.iter().filter(|p| p.email.is_some()).collect();
    candidates.sort_by_key(|p| (rank(&p.page_type), p.id));
    candidates.first().and_then(|p| p.email.clone())
}

/// Shallower URLs first, alphabetical within a depth.
fn url_depth(url: &str) -> usize {
    Url::parse(url)
        .map(|u| {
            u.path()
                .split('/')
                .filter(|segment| !segment.is_empty())
                .count()
        })
        .unwrap_or(0)
}

fn render_report(business: &Business, pages: &[StoredPage], complete: bool) -> String {
    let mut ordered: Vec<&StoredPage> = pages.iter().collect();
    ordered.sort_by(|a, b| {
        url_depth(&a.url)
            .cmp(&url_depth(&b.url))
            .then_with(|| a.url.cmp(&b.url))
    });

    let socials = consolidate_social_links(pages);
    let social_links_html = if socials.is_empty() {
        "<li>N/A</li>".to_string()
    } else {
        socials
            .iter()
            .map(|link| {
                format!(
                    "<li>{}: {}</li>",
                    escape_html(&link.platform),
                    escape_html(&link.url)
                )
            })
            .collect::<Vec<_>>()
            .join("\n      ")
    };

    let location = [business.city.as_deref(), business.state.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

    let confidence_note = if complete {
        String::new()
    } else {
        "Low confidence: no pages could be crawled for this business.".to_string()
    };

    let placeholder = format!(
        "data:image/gif;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(TRANSPARENT_GIF)
    );

    let values: Vec<(&str, String)> = vec![
        ("BUSINESS_NAME", escape_html(&business.name)),
        ("BUSINESS_LOCATION", display_or_na(Some(&location))),
        ("BUSINESS_WEBSITE", display_or_na(business.website.as_deref())),
        (
            "BUSINESS_RATING",
            business
                .rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        ("REVIEW_COUNT", number_or_na(business.review_count)),
        ("BUSINESS_CATEGORIES", display_or_na(business.categories.as_deref())),
        ("CONTACT_EMAIL", display_or_na(representative_email(pages).as_deref())),
        ("SOCIAL_LINKS_HTML", social_links_html),
        (
            "COVERAGE",
            format!("{} page(s) crawled for this business.", pages.len()),
        ),
        ("CONFIDENCE_NOTE", confidence_note),
        ("GENERATED_AT", Utc::now().format("%Y-%m-%d %H:%M UTC").to_string()),
        ("PLACEHOLDER_IMG", placeholder),
    ];

    let html = render_template(REPORT_TEMPLATE, &values);

    render_indexed_block(
        &html,
        "<!--PAGE_ROW_START-->",
        "<!--PAGE_ROW_END-->",
        ordered.len(),
        |index, row_template| {
            let page = ordered[index];
            row_template
                .replace("{PAGE_URL}", &display_or_na(Some(&page.url)))
                .replace("{PAGE_TYPE}", &display_or_na(Some(&page.page_type)))
                .replace("{PAGE_SUMMARY}", &display_or_na(page.summary.as_deref()))
                .replace("{PAGE_SCORE}", &number_or_na(page.page_speed_score))
                .replace("{PAGE_LOAD_TIME}", &ms_to_seconds(page.time_to_interactive_ms))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_db_pool, upsert_business, upsert_business_page};

    async fn test_pool() -> DbPool {
        let path = std::env::temp_dir().join(format!("enricher-report-{}.db", uuid::Uuid::new_v4()));
        create_db_pool(path.to_str().unwrap()).await.unwrap()
    }

    fn business(id: &str, name: &str) -> Business {
        Business {
            id: id.to_string(),
            name: name.to_string(),
            website: Some("https://example.com".to_string()),
            address: None,
            city: Some("Charlotte".to_string()),
            state: Some("NC".to_string()),
            zip_code: None,
            phone: None,
            rating: Some(4.0),
            review_count: Some(10),
            categories: None,
            crm_lead_id: None,
        }
    }

    fn page(business_id: &str, url: &str, page_type: &str, email: Option<&str>, socials: Option<&str>) -> StoredPage {
        StoredPage {
            id: None,
            business_id: business_id.to_string(),
            url: url.to_string(),
            page_type: page_type.to_string(),
            summary: Some("A page".to_string()),
            email: email.map(str::to_string),
            social_links: socials.map(str::to_string),
            page_speed_score: Some(90),
            time_to_interactive_ms: Some(1500),
            crawled_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn social_links_consolidate_across_pages_first_occurrence_wins() {
        let pages = vec![
            page("b1", "https://a.com", "Home", None, Some("facebook:https://facebook.com/one")),
            page(
                "b1",
                "https://a.com/contact",
                "Contact",
                None,
                Some("facebook:https://facebook.com/two,instagram:https://instagram.com/x"),
            ),
        ];

        let links = consolidate_social_links(&pages);
        assert_eq!(
            social::serialize_links(&links),
            "facebook:https://facebook.com/one,instagram:https://instagram.com/x"
        );
    }

    #[test]
    fn representative_email_prefers_contact_then_home() {
        let mut home = page("b1", "https://a.com", "Home", Some("home@a.com"), None);
        home.id = Some(1);
        let mut other = page("b1", "https://a.com/blog", "Other", Some("blog@a.com"), None);
        other.id = Some(2);
        let mut contact = page("b1", "https://a.com/contact", "Contact", Some("contact@a.com"), None);
        contact.id = Some(3);

        let pages = vec![other.clone(), home.clone(), contact.clone()];
        assert_eq!(representative_email(&pages).as_deref(), Some("contact@a.com"));

        let pages = vec![other.clone(), home];
        assert_eq!(representative_email(&pages).as_deref(), Some("home@a.com"));

        let pages = vec![other];
        assert_eq!(representative_email(&pages).as_deref(), Some("blog@a.com"));
    }

    #[test]
    fn pages_order_by_depth_then_url() {
        assert_eq!(url_depth("https://a.com"), 0);
        assert_eq!(url_depth("https://a.com/about"), 1);
        assert_eq!(url_depth("https://a.com/about/team"), 2);
    }

    #[tokio::test]
    async fn identical_names_get_distinct_folders() {
        let pool = test_pool().await;
        let reports_root = std::env::temp_dir().join(format!("enricher-reports-{}", uuid::Uuid::new_v4()));

        let first = business("b1", "Joe's Pizza & Grill!!");
        let second = business("b2", "Joe's Pizza & Grill!!");
        upsert_business(&pool, &first).await.unwrap();
        upsert_business(&pool, &second).await.unwrap();

        let compiler = ReportCompiler::new(pool, &reports_root);
        let first_report = compiler.compile(&first).await.unwrap();
        let second_report = compiler.compile(&second).await.unwrap();

        assert_eq!(
            first_report.path,
            reports_root.join("joe-s-pizza-grill").join(REPORT_FILE_NAME)
        );
        assert_eq!(
            second_report.path,
            reports_root.join("joe-s-pizza-grill-b2").join(REPORT_FILE_NAME)
        );
        assert!(first_report.path.exists());
        assert!(second_report.path.exists());
    }

    #[tokio::test]
    async fn zero_pages_still_produces_a_flagged_report() {
        let pool = test_pool().await;
        let reports_root = std::env::temp_dir().join(format!("enricher-reports-{}", uuid::Uuid::new_v4()));

        let biz = business("b1", "Empty Diner");
        upsert_business(&pool, &biz).await.unwrap();

        let compiler = ReportCompiler::new(pool, &reports_root);
        let report = compiler.compile(&biz).await.unwrap();

        assert!(!report.complete);
        assert_eq!(report.pages_included, 0);
        let html = std::fs::read_to_string(&report.path).unwrap();
        assert!(html.contains("Low confidence"));
    }

    #[tokio::test]
    async fn recompiling_overwrites_in_place() {
        let pool = test_pool().await;
        let reports_root = std::env::temp_dir().join(format!("enricher-reports-{}", uuid::Uuid::new_v4()));

        let biz = business("b1", "Acme");
        upsert_business(&pool, &biz).await.unwrap();
        upsert_business_page(
            &pool,
            &page("b1", "https://example.com", "Home", Some("hi@example.com"), None),
        )
        .await
        .unwrap();

        let compiler = ReportCompiler::new(pool, &reports_root);
        let first = compiler.compile(&biz).await.unwrap();
        let second = compiler.compile(&biz).await.unwrap();

        assert_eq!(first.path, second.path);
        let html = std::fs::read_to_string(&second.path).unwrap();
        assert!(html.contains("hi@example.com"));
    }
}
