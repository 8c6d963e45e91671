//! Full items-refresh cycles against the real SQLite store.
//!
//! Drives the sync engine end-to-end with a scripted catalog: items that
//! disappear from the remote listing between cycles must end up unlisted
//! locally, rediscovered items must be re-marked listed with freshly
//! scraped fields, and no identity may ever be duplicated.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vine_tools::domain::entities::{Category, Subcategory};
use vine_tools::domain::errors::CrawlError;
use vine_tools::domain::events::event_channel;
use vine_tools::domain::repositories::{CategoryRepository, ItemRepository};
use vine_tools::infrastructure::config::CrawlingConfig;
use vine_tools::infrastructure::database_connection::DatabaseConnection;
use vine_tools::infrastructure::http_client::{CatalogClient, ListingRequest, VinePage};
use vine_tools::infrastructure::refresh_tracker::RefreshTracker;
use vine_tools::infrastructure::repositories::{SqliteCategoryRepository, SqliteItemRepository};
use vine_tools::infrastructure::sync_engine::SyncEngine;
use vine_tools::infrastructure::thumbnail_cache::ThumbnailStore;

/// Serves whatever listing HTML the test currently has scripted for each
/// child node, so consecutive refresh cycles can see different catalogs.
struct ScriptedCatalog {
    pages: Mutex<HashMap<String, String>>,
}

impl ScriptedCatalog {
    fn set_page(&self, child_node: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(child_node.to_string(), html.to_string());
    }
}

#[async_trait]
impl CatalogClient for ScriptedCatalog {
    async fn fetch_listing(&self, request: &ListingRequest) -> Result<VinePage, CrawlError> {
        let child_node = request.child_node.clone().unwrap_or_default();
        let pages = self.pages.lock().unwrap();
        match pages.get(&child_node) {
            Some(html) => Ok(VinePage {
                url: format!("https://www.amazon.com/vine/vine-items?cn={child_node}"),
                html: html.clone(),
            }),
            None => Err(CrawlError::Network(format!(
                "no scripted page for node {child_node}"
            ))),
        }
    }

    async fn fetch_item_detail(
        &self,
        _item_id: &str,
        _asin: &str,
        _referer: Option<&str>,
    ) -> Result<serde_json::Value, CrawlError> {
        Err(CrawlError::EmptyResult("not scripted".to_string()))
    }
}

struct PassthroughThumbs;

#[async_trait]
impl ThumbnailStore for PassthroughThumbs {
    async fn ensure(&self, remote_url: &str) -> Result<PathBuf, CrawlError> {
        let filename = remote_url.rsplit('/').next().unwrap_or("unknown");
        Ok(PathBuf::from("/cache").join(filename))
    }
}

const TWO_CABLES: &str = r#"
    <div id="vvp-items-grid">
        <div class="vvp-item-tile" data-recommendation-id="a#q#A1#x"
             data-img-url="https://img.example/cable-a.jpg">
            <span class="a-truncate-full">Cable A</span>
        </div>
        <div class="vvp-item-tile" data-recommendation-id="b#q#A2#x"
             data-img-url="https://img.example/cable-b.jpg">
            <span class="a-truncate-full">Cable B</span>
        </div>
    </div>
"#;

const ONLY_CABLE_B: &str = r#"
    <div id="vvp-items-grid">
        <div class="vvp-item-tile" data-recommendation-id="b#q#A2#x"
             data-img-url="https://img.example/cable-b.jpg">
            <span class="a-truncate-full">Cable B (2nd run)</span>
        </div>
    </div>
"#;

struct Stack {
    engine: SyncEngine,
    items: Arc<SqliteItemRepository>,
    catalog: Arc<ScriptedCatalog>,
    _dir: tempfile::TempDir,
}

async fn stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite:{}", dir.path().join("vine.db").to_string_lossy());
    let connection = DatabaseConnection::new(&database_url).await.unwrap();
    connection.migrate().await.unwrap();
    let pool = connection.pool().clone();

    let categories = Arc::new(SqliteCategoryRepository::new(pool.clone()));
    categories
        .replace_all(&[Category {
            name: "Electronics".to_string(),
            node_id: "P1".to_string(),
            item_count: 2,
            subcategories: vec![Subcategory {
                name: "Cables".to_string(),
                node_id: "C1".to_string(),
                item_count: 2,
            }],
        }])
        .await
        .unwrap();

    let items = Arc::new(SqliteItemRepository::new(pool));
    let tracker = Arc::new(
        RefreshTracker::load(
            dir.path().join("refresh_state.json"),
            chrono::Duration::days(7),
            chrono::Duration::days(1),
        )
        .await
        .unwrap(),
    );
    let catalog = Arc::new(ScriptedCatalog {
        pages: Mutex::new(HashMap::new()),
    });

    let config = CrawlingConfig {
        category_jitter_ms: (0, 0),
        listing_jitter_ms: (0, 0),
        ..CrawlingConfig::default()
    };

    let engine = SyncEngine::new(
        Arc::clone(&catalog) as Arc<dyn CatalogClient>,
        categories,
        Arc::clone(&items) as Arc<dyn ItemRepository>,
        Arc::new(PassthroughThumbs),
        tracker,
        config,
        event_channel(),
    );

    Stack {
        engine,
        items,
        catalog,
        _dir: dir,
    }
}

#[tokio::test]
async fn delisted_items_survive_as_unlisted_history() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    // First cycle: both cables are on offer.
    stack.catalog.set_page("C1", TWO_CABLES);
    let first = stack.engine.refresh_items(&cancel).await;
    assert!(first.succeeded(), "first cycle failed: {}", first.message);
    assert_eq!(stack.items.find_listed().await.unwrap().len(), 2);

    // Second cycle: Cable A disappeared from the remote listing.
    stack.catalog.set_page("C1", ONLY_CABLE_B);
    let second = stack.engine.refresh_items(&cancel).await;
    assert!(second.succeeded(), "second cycle failed: {}", second.message);

    let listed = stack.items.find_listed().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "b#q#A2#x");
    assert_eq!(listed[0].product_name, "Cable B (2nd run)");
    assert_eq!(listed[0].position, 1);

    // Cable A is history, not deleted.
    let all = stack.items.find_all().await.unwrap();
    assert_eq!(all.len(), 2);
    let cable_a = stack.items.find_by_id("a#q#A1#x").await.unwrap().unwrap();
    assert!(!cable_a.listed);
    assert_eq!(cable_a.product_name, "Cable A");
}

#[tokio::test]
async fn repeated_cycles_never_duplicate_identities() {
    let stack = stack().await;
    let cancel = CancellationToken::new();
    stack.catalog.set_page("C1", TWO_CABLES);

    for _ in 0..3 {
        let report = stack.engine.refresh_items(&cancel).await;
        assert!(report.succeeded());
    }

    let all = stack.items.find_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|item| item.listed));
}
