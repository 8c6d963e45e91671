//! Category taxonomy discovery
//!
//! Crawls the two-level browse-node tree: one minimal listing page for the
//! top-level categories, then one scoped page per category for its
//! subcategories. Fetches are strictly sequential with a randomized pause
//! before each subcategory page; the pause is required crawl behavior, not
//! an optimization.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::entities::Category;
use crate::domain::errors::CrawlError;
use crate::domain::events::{EventChannel, SyncEvent};
use crate::infrastructure::html_parser::VineDataExtractor;
use crate::infrastructure::http_client::{CatalogClient, ListingRequest};

/// Sleep a uniformly random time within `range_ms` (inclusive).
pub(crate) async fn pause_with_jitter(range_ms: (u64, u64)) {
    let (low, high) = range_ms;
    let wait = if high > low {
        fastrand::u64(low..=high)
    } else {
        low
    };
    if wait > 0 {
        tracing::debug!(wait_ms = wait, "pausing before next request");
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }
}

/// Discovers the full category tree from the catalog navigation widget.
pub struct TaxonomyCrawler {
    client: Arc<dyn CatalogClient>,
    extractor: VineDataExtractor,
    jitter_ms: (u64, u64),
    events: EventChannel<SyncEvent>,
}

impl TaxonomyCrawler {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        jitter_ms: (u64, u64),
        events: EventChannel<SyncEvent>,
    ) -> Self {
        Self {
            client,
            extractor: VineDataExtractor::new(),
            jitter_ms,
            events,
        }
    }

    /// Crawl the full tree, emitting one progress notification per
    /// category. Returns the complete tree; the caller replaces the store
    /// wholesale, there is no merging with a previous crawl.
    ///
    /// Any fetch or parse failure aborts the whole crawl; a partially
    /// discovered tree is never returned.
    pub async fn crawl(&self) -> Result<Vec<Category>, CrawlError> {
        self.emit("Scraping catalog category pages...");
        let page = self
            .client
            .fetch_listing(&ListingRequest::taxonomy_probe())
            .await?;
        let mut categories = self.extractor.extract_categories(&page.html)?;
        info!(count = categories.len(), "discovered top-level categories");

        for category in &mut categories {
            pause_with_jitter(self.jitter_ms).await;
            info!(category = %category.name, "scraping subcategories");
            self.emit(&format!("Scraping subcategories of {}...", category.name));

            let page = self
                .client
                .fetch_listing(&ListingRequest::subcategory_probe(&category.node_id))
                .await?;
            category.subcategories = self.extractor.extract_subcategories(&page.html)?;
        }

        Ok(categories)
    }

    fn emit(&self, message: &str) {
        // Nobody listening is fine; progress is advisory.
        let _ = self.events.send(SyncEvent::CategoryProgress {
            message: message.to_string(),
        });
    }
}
