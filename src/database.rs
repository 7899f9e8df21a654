use chrono::{DateTime, Utc};
use mobc::{Manager, Pool};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info};

use crate::models::Business;

fn log_rusqlite_error(context: &str, err: &rusqlite::Error) {
    error!("🔥 SQLite error in {}: {:?}", context, err);
}

/// One crawled page of a business's website. Unique per (business_id, url);
/// re-crawls update the row in place.
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub id: Option<i64>,
    pub business_id: String,
    pub url: String,
    pub page_type: String,
    pub summary: Option<String>,
    pub email: Option<String>,
    pub social_links: Option<String>,
    pub page_speed_score: Option<i64>,
    pub time_to_interactive_ms: Option<i64>,
    pub crawled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    pub fn new(db_path: String) -> Self {
        debug!("🔧 Creating SqliteManager for path: {}", db_path);
        Self { db_path }
    }
}

#[async_trait::async_trait]
impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        debug!("🔌 Opening database: {}", self.db_path);
        let conn = Connection::open(&self.db_path)?;

        // Some PRAGMA statements return a result row, so execute() alone
        // is not enough.
        let exec_pragma = |conn: &Connection, pragma: &str| -> Result<(), rusqlite::Error> {
            match conn.execute(pragma, []) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::ExecuteReturnedResults) => {
                    conn.query_row(pragma, [], |_| Ok(()))
                }
                Err(e) => Err(e),
            }
        };

        exec_pragma(&conn, "PRAGMA journal_mode=WAL")?;
        exec_pragma(&conn, "PRAGMA synchronous=NORMAL")?;
        exec_pragma(&conn, "PRAGMA busy_timeout=5000")?;
        exec_pragma(&conn, "PRAGMA foreign_keys=ON")?;
        exec_pragma(&conn, "PRAGMA temp_store=memory")?;

        if let Err(e) = init_database(&conn) {
            log_rusqlite_error("init_database", &e);
            return Err(e);
        }

        Ok(conn)
    }

    async fn check(&self, conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(conn)
    }
}

fn init_database(conn: &Connection) -> SqliteResult<()> {
    create_businesses_table(conn)?;
    create_business_pages_table(conn)?;
    ensure_social_links_column(conn)?;
    create_indexes(conn)?;
    Ok(())
}

pub type DbPool = Pool<SqliteManager>;

pub async fn create_db_pool(
    db_path: &str,
) -> Result<DbPool, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = Path::new(db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let manager = SqliteManager::new(db_path.to_string());
    let pool = Pool::builder().max_open(10).max_idle(5).build(manager);

    info!("✓ SQLite connection pool created: {}", db_path);
    Ok(pool)
}

fn create_businesses_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            website TEXT,
            address TEXT,
            city TEXT,
            state TEXT,
            zip_code TEXT,
            phone TEXT,
            rating REAL,
            review_count INTEGER,
            categories TEXT,
            crm_lead_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        [],
    )?;
    Ok(())
}

fn create_business_pages_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS business_pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id TEXT NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            url TEXT NOT NULL,
            page_type TEXT NOT NULL DEFAULT 'Other',
            summary TEXT,
            email TEXT,
            page_speed_score INTEGER,
            time_to_interactive_ms INTEGER,
            crawled_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(business_id, url)
        )
        "#,
        [],
    )?;
    Ok(())
}

/// Additive migration: rows written before the column existed read back as
/// an empty social-link list.
fn ensure_social_links_column(conn: &Connection) -> SqliteResult<()> {
    let has_column: bool = conn
        .prepare("SELECT COUNT(*) FROM pragma_table_info('business_pages') WHERE name = 'social_links'")?
        .query_row([], |row| row.get::<_, i64>(0))
        .map(|count| count > 0)?;

    if !has_column {
        info!("📐 Adding social_links column to business_pages");
        conn.execute("ALTER TABLE business_pages ADD COLUMN social_links TEXT NULL", [])?;
    }
    Ok(())
}

fn create_indexes(conn: &Connection) -> SqliteResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_businesses_name ON businesses(name)",
        "CREATE INDEX IF NOT EXISTS idx_businesses_crm_lead ON businesses(crm_lead_id)",
        "CREATE INDEX IF NOT EXISTS idx_business_pages_business ON business_pages(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_business_pages_type ON business_pages(page_type)",
        "CREATE INDEX IF NOT EXISTS idx_business_pages_email ON business_pages(email)",
    ];

    for index_sql in indexes.iter() {
        conn.execute(index_sql, [])?;
    }
    Ok(())
}

pub async fn upsert_business(
    pool: &DbPool,
    business: &Business,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    debug!("💾 upsert_business() - {}", business.id);

    let conn = pool.get().await?;
    let now = Utc::now();

    match conn.execute(
        r#"
        INSERT INTO businesses (
            id, name, website, address, city, state, zip_code, phone,
            rating, review_count, categories, crm_lead_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            website = COALESCE(NULLIF(excluded.website, ''), website),
            address = COALESCE(NULLIF(excluded.address, ''), address),
            city = COALESCE(NULLIF(excluded.city, ''), city),
            state = COALESCE(NULLIF(excluded.state, ''), state),
            zip_code = COALESCE(NULLIF(excluded.zip_code, ''), zip_code),
            phone = COALESCE(NULLIF(excluded.phone, ''), phone),
            rating = COALESCE(excluded.rating, rating),
            review_count = COALESCE(excluded.review_count, review_count),
            categories = COALESCE(NULLIF(excluded.categories, ''), categories),
            crm_lead_id = COALESCE(NULLIF(excluded.crm_lead_id, ''), crm_lead_id),
            updated_at = excluded.updated_at
        "#,
        params![
            business.id,
            business.name,
            business.website.as_deref().unwrap_or(""),
            business.address.as_deref().unwrap_or(""),
            business.city.as_deref().unwrap_or(""),
            business.state.as_deref().unwrap_or(""),
            business.zip_code.as_deref().unwrap_or(""),
            business.phone.as_deref().unwrap_or(""),
            business.rating,
            business.review_count,
            business.categories.as_deref().unwrap_or(""),
            business.crm_lead_id.as_deref().unwrap_or(""),
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            log_rusqlite_error("upsert_business", &e);
            Err(Box::new(e))
        }
    }
}

pub async fn business_recently_updated(
    pool: &DbPool,
    business_id: &str,
    max_age_hours: i64,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;
    let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);

    let updated_at: Option<String> = conn
        .query_row(
            "SELECT updated_at FROM businesses WHERE id = ?1",
            [business_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let recent = match updated_at {
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc) > cutoff)
            .unwrap_or(false),
        None => false,
    };
    Ok(recent)
}

fn row_to_business(row: &rusqlite::Row<'_>) -> rusqlite::Result<Business> {
    let get_optional_string = |idx: usize| -> rusqlite::Result<Option<String>> {
        Ok(match row.get::<_, Option<String>>(idx)? {
            Some(s) if !s.is_empty() => Some(s),
            _ => None,
        })
    };

    Ok(Business {
        id: row.get(0)?,
        name: row.get(1)?,
        website: get_optional_string(2)?,
        address: get_optional_string(3)?,
        city: get_optional_string(4)?,
        state: get_optional_string(5)?,
        zip_code: get_optional_string(6)?,
        phone: get_optional_string(7)?,
        rating: row.get::<_, Option<f64>>(8)?,
        review_count: row.get::<_, Option<i64>>(9)?,
        categories: get_optional_string(10)?,
        crm_lead_id: get_optional_string(11)?,
    })
}

const BUSINESS_COLUMNS: &str = "id, name, website, address, city, state, zip_code, phone, \
                                rating, review_count, categories, crm_lead_id";

/// All businesses in ingestion order (insertion order is stable in SQLite
/// for this table since rows are never deleted by the core).
pub async fn list_businesses(
    pool: &DbPool,
) -> Result<Vec<Business>, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM businesses ORDER BY created_at, id",
        BUSINESS_COLUMNS
    ))?;
    let rows = stmt.query_map([], row_to_business)?;

    let mut businesses = Vec::new();
    for business in rows {
        businesses.push(business?);
    }
    Ok(businesses)
}

pub async fn get_business(
    pool: &DbPool,
    business_id: &str,
) -> Result<Option<Business>, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM businesses WHERE id = ?1",
        BUSINESS_COLUMNS
    ))?;
    let mut rows = stmt.query_map([business_id], row_to_business)?;

    match rows.next() {
        Some(business) => Ok(Some(business?)),
        None => Ok(None),
    }
}

/// Upsert a crawled page on the (business_id, url) key.
///
/// Conflict handling never regresses a previously extracted non-empty field
/// to an empty one: a degraded re-crawl (empty extractions, type Other)
/// leaves earlier data intact, while a successful re-crawl with fresh values
/// wins.
pub async fn upsert_business_page(
    pool: &DbPool,
    page: &StoredPage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    debug!(
        "💾 upsert_business_page() - {} {}",
        page.business_id, page.url
    );

    let conn = pool.get().await?;
    let now = Utc::now();

    match conn.execute(
        r#"
        INSERT INTO business_pages (
            business_id, url, page_type, summary, email, social_links,
            page_speed_score, time_to_interactive_ms, crawled_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT (business_id, url) DO UPDATE SET
            page_type = COALESCE(NULLIF(excluded.page_type, 'Other'), page_type),
            summary = COALESCE(NULLIF(excluded.summary, ''), summary),
            email = COALESCE(NULLIF(excluded.email, ''), email),
            social_links = COALESCE(NULLIF(excluded.social_links, ''), social_links),
            page_speed_score = COALESCE(excluded.page_speed_score, page_speed_score),
            time_to_interactive_ms = COALESCE(excluded.time_to_interactive_ms, time_to_interactive_ms),
            updated_at = excluded.updated_at
        "#,
        params![
            page.business_id,
            page.url,
            page.page_type,
            page.summary.as_deref().unwrap_or(""),
            page.email.as_deref().unwrap_or(""),
            page.social_links.as_deref().unwrap_or(""),
            page.page_speed_score,
            page.time_to_interactive_ms,
            page.crawled_at.to_rfc3339(),
            now.to_rfc3339(),
        ],
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            log_rusqlite_error("upsert_business_page", &e);
            Err(Box::new(e))
        }
    }
}

/// URLs that already have a persisted row for this business, used to skip
/// re-crawling on non-forced runs.
pub async fn crawled_urls(
    pool: &DbPool,
    business_id: &str,
) -> Result<HashSet<String>, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    let mut stmt = conn.prepare("SELECT url FROM business_pages WHERE business_id = ?1")?;
    let rows = stmt.query_map([business_id], |row| row.get::<_, String>(0))?;

    let mut urls = HashSet::new();
    for url in rows {
        urls.insert(url?);
    }
    Ok(urls)
}

pub async fn pages_for_business(
    pool: &DbPool,
    business_id: &str,
) -> Result<Vec<StoredPage>, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    let mut stmt = conn.prepare(
        "SELECT id, business_id, url, page_type, summary, email, social_links, \
                page_speed_score, time_to_interactive_ms, crawled_at, updated_at \
         FROM business_pages WHERE business_id = ?1 ORDER BY id",
    )?;

    let page_iter = stmt.query_map([business_id], |row| {
        let get_optional_string = |idx: usize| -> rusqlite::Result<Option<String>> {
            Ok(match row.get::<_, Option<String>>(idx)? {
                Some(s) if !s.is_empty() => Some(s),
                _ => None,
            })
        };

        let parse_ts = |idx: usize| -> rusqlite::Result<DateTime<Utc>> {
            let s: String = row.get(idx)?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(idx, s.clone(), rusqlite::types::Type::Text)
                })
        };

        Ok(StoredPage {
            id: row.get(0)?,
            business_id: row.get(1)?,
            url: row.get(2)?,
            page_type: row.get(3)?,
            summary: get_optional_string(4)?,
            email: get_optional_string(5)?,
            social_links: get_optional_string(6)?,
            page_speed_score: row.get::<_, Option<i64>>(7)?,
            time_to_interactive_ms: row.get::<_, Option<i64>>(8)?,
            crawled_at: parse_ts(9)?,
            updated_at: parse_ts(10)?,
        })
    })?;

    let mut pages = Vec::new();
    for page in page_iter {
        pages.push(page?);
    }
    Ok(pages)
}

#[derive(Debug, serde::Serialize)]
pub struct DatabaseStats {
    pub total_businesses: i64,
    pub businesses_with_website: i64,
    pub businesses_with_crm_lead: i64,
    pub total_pages: i64,
    pub pages_with_email: i64,
    pub pages_with_social_links: i64,
    pub avg_page_speed_score: f64,
    pub pages_by_type: Vec<(String, i64)>,
}

pub async fn get_database_stats(
    pool: &DbPool,
) -> Result<DatabaseStats, Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    let count = |query: &str| -> Result<i64, rusqlite::Error> {
        conn.query_row(query, [], |row| row.get::<_, i64>(0))
    };

    let total_businesses = count("SELECT COUNT(*) FROM businesses")?;
    let businesses_with_website =
        count("SELECT COUNT(*) FROM businesses WHERE website IS NOT NULL AND website != ''")?;
    let businesses_with_crm_lead =
        count("SELECT COUNT(*) FROM businesses WHERE crm_lead_id IS NOT NULL AND crm_lead_id != ''")?;
    let total_pages = count("SELECT COUNT(*) FROM business_pages")?;
    let pages_with_email =
        count("SELECT COUNT(*) FROM business_pages WHERE email IS NOT NULL AND email != ''")?;
    let pages_with_social_links = count(
        "SELECT COUNT(*) FROM business_pages WHERE social_links IS NOT NULL AND social_links != ''",
    )?;

    let avg_page_speed_score: f64 = conn.query_row(
        "SELECT AVG(CAST(page_speed_score AS REAL)) FROM business_pages \
         WHERE page_speed_score IS NOT NULL",
        [],
        |row| row.get::<_, Option<f64>>(0),
    )?
    .unwrap_or(0.0);

    let mut stmt = conn.prepare(
        "SELECT page_type, COUNT(*) FROM business_pages GROUP BY page_type ORDER BY COUNT(*) DESC",
    )?;
    let type_iter = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut pages_by_type = Vec::new();
    for entry in type_iter {
        pages_by_type.push(entry?);
    }

    Ok(DatabaseStats {
        total_businesses,
        businesses_with_website,
        businesses_with_crm_lead,
        total_pages,
        pages_with_email,
        pages_with_social_links,
        avg_page_speed_score,
        pages_by_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DbPool {
        let path = std::env::temp_dir().join(format!("enricher-test-{}.db", uuid::Uuid::new_v4()));
        create_db_pool(path.to_str().unwrap()).await.unwrap()
    }

    fn sample_business(id: &str, name: &str) -> Business {
        Business {
            id: id.to_string(),
            name: name.to_string(),
            website: Some("https://example.com".to_string()),
            address: None,
            city: Some("Charlotte".to_string()),
            state: Some("NC".to_string()),
            zip_code: None,
            phone: None,
            rating: Some(4.5),
            review_count: Some(120),
            categories: Some("Restaurants".to_string()),
            crm_lead_id: None,
        }
    }

    fn sample_page(business_id: &str, url: &str) -> StoredPage {
        StoredPage {
            id: None,
            business_id: business_id.to_string(),
            url: url.to_string(),
            page_type: "Contact".to_string(),
            summary: Some("Get in touch".to_string()),
            email: Some("hello@example.com".to_string()),
            social_links: Some("facebook:https://facebook.com/acme".to_string()),
            page_speed_score: Some(88),
            time_to_interactive_ms: Some(2072),
            crawled_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_page_is_unique_per_business_and_url() {
        let pool = test_pool().await;
        upsert_business(&pool, &sample_business("b1", "Acme")).await.unwrap();

        upsert_business_page(&pool, &sample_page("b1", "https://example.com")).await.unwrap();
        upsert_business_page(&pool, &sample_page("b1", "https://example.com")).await.unwrap();

        let pages = pages_for_business(&pool, "b1").await.unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn degraded_recrawl_does_not_blank_extracted_fields() {
        let pool = test_pool().await;
        upsert_business(&pool, &sample_business("b1", "Acme")).await.unwrap();
        upsert_business_page(&pool, &sample_page("b1", "https://example.com/contact"))
            .await
            .unwrap();

        let degraded = StoredPage {
            page_type: "Other".to_string(),
            summary: None,
            email: None,
            social_links: None,
            page_speed_score: None,
            time_to_interactive_ms: None,
            ..sample_page("b1", "https://example.com/contact")
        };
        upsert_business_page(&pool, &degraded).await.unwrap();

        let pages = pages_for_business(&pool, "b1").await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_type, "Contact");
        assert_eq!(pages[0].email.as_deref(), Some("hello@example.com"));
        assert_eq!(
            pages[0].social_links.as_deref(),
            Some("facebook:https://facebook.com/acme")
        );
        assert_eq!(pages[0].page_speed_score, Some(88));
    }

    #[tokio::test]
    async fn successful_recrawl_updates_fields() {
        let pool = test_pool().await;
        upsert_business(&pool, &sample_business("b1", "Acme")).await.unwrap();
        upsert_business_page(&pool, &sample_page("b1", "https://example.com/contact"))
            .await
            .unwrap();

        let refreshed = StoredPage {
            email: Some("new@example.com".to_string()),
            page_speed_score: Some(93),
            ..sample_page("b1", "https://example.com/contact")
        };
        upsert_business_page(&pool, &refreshed).await.unwrap();

        let pages = pages_for_business(&pool, "b1").await.unwrap();
        assert_eq!(pages[0].email.as_deref(), Some("new@example.com"));
        assert_eq!(pages[0].page_speed_score, Some(93));
    }

    #[tokio::test]
    async fn deleting_business_cascades_to_pages() {
        let pool = test_pool().await;
        upsert_business(&pool, &sample_business("b1", "Acme")).await.unwrap();
        upsert_business_page(&pool, &sample_page("b1", "https://example.com")).await.unwrap();

        let conn = pool.get().await.unwrap();
        conn.execute("DELETE FROM businesses WHERE id = 'b1'", []).unwrap();
        drop(conn);

        let pages = pages_for_business(&pool, "b1").await.unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn social_links_migration_is_idempotent() {
        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        // Column already added by pool init; running again must not fail.
        ensure_social_links_column(&conn).unwrap();
        ensure_social_links_column(&conn).unwrap();
    }

    #[tokio::test]
    async fn reingestion_does_not_blank_crm_lead() {
        let pool = test_pool().await;
        let mut business = sample_business("b1", "Acme");
        business.crm_lead_id = Some("lead-42".to_string());
        upsert_business(&pool, &business).await.unwrap();

        // Directory records never carry a lead id.
        business.crm_lead_id = None;
        upsert_business(&pool, &business).await.unwrap();

        let stored = get_business(&pool, "b1").await.unwrap().unwrap();
        assert_eq!(stored.crm_lead_id.as_deref(), Some("lead-42"));
    }
}
