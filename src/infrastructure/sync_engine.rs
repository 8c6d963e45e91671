//! Refresh orchestration for the two data domains
//!
//! The items refresh is the intricate path: soft-delete everything, walk
//! the stored taxonomy in tree order with jittered sequential fetches,
//! upsert each discovered item with a single corrected retry on revision
//! conflicts, and emit one progress event per item regardless of write
//! outcome. One bad page never aborts the whole refresh; only a missing
//! category tree does.
//!
//! The categories refresh is deliberately different: the crawled tree
//! replaces the stored collection wholesale, dropping anything no longer
//! present. The asymmetry matches the observed site behavior and is kept
//! on purpose.

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::entities::{RefreshDomain, VineItem};
use crate::domain::errors::CrawlError;
use crate::domain::events::{EventChannel, EventReceiver, SyncEvent, SyncReport, SyncStatus};
use crate::domain::repositories::{CategoryRepository, ItemRepository};
use crate::infrastructure::config::{CrawlingConfig, amazon_vine};
use crate::infrastructure::html_parser::VineDataExtractor;
use crate::infrastructure::http_client::{CatalogClient, ListingRequest};
use crate::infrastructure::refresh_tracker::RefreshTracker;
use crate::infrastructure::taxonomy_crawler::{TaxonomyCrawler, pause_with_jitter};
use crate::infrastructure::thumbnail_cache::ThumbnailStore;

/// Orchestrates full refresh cycles against the store and the remote
/// catalog. One engine instance is shared by all facade operations; each
/// refresh invocation owns its own progress counters.
pub struct SyncEngine {
    client: Arc<dyn CatalogClient>,
    categories: Arc<dyn CategoryRepository>,
    items: Arc<dyn ItemRepository>,
    thumbnails: Arc<dyn ThumbnailStore>,
    tracker: Arc<RefreshTracker>,
    extractor: VineDataExtractor,
    config: CrawlingConfig,
    events: EventChannel<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        categories: Arc<dyn CategoryRepository>,
        items: Arc<dyn ItemRepository>,
        thumbnails: Arc<dyn ThumbnailStore>,
        tracker: Arc<RefreshTracker>,
        config: CrawlingConfig,
        events: EventChannel<SyncEvent>,
    ) -> Self {
        Self {
            client,
            categories,
            items,
            thumbnails,
            tracker,
            extractor: VineDataExtractor::new(),
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> EventReceiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Crawl the category taxonomy and replace the stored tree wholesale.
    pub async fn refresh_categories(&self, cancel: &CancellationToken) -> SyncReport {
        let started_at = Utc::now();
        if cancel.is_cancelled() {
            return self.report(SyncStatus::Cancelled, 0, 0, 0, "Category update cancelled.", started_at);
        }

        let crawler = TaxonomyCrawler::new(
            Arc::clone(&self.client),
            self.config.category_jitter_ms,
            self.events.clone(),
        );
        let tree = match crawler.crawl().await {
            Ok(tree) => tree,
            Err(err) => {
                error!(%err, "category crawl failed");
                return self.report(
                    SyncStatus::Failed,
                    0,
                    0,
                    1,
                    &format!("Failed to crawl catalog categories: {err}"),
                    started_at,
                );
            }
        };

        self.emit_category_progress("Updating the category database...");
        if let Err(err) = self.categories.replace_all(&tree).await {
            error!(%err, "category replacement failed");
            return self.report(
                SyncStatus::Failed,
                0,
                tree.len() as u32,
                1,
                &format!("Failed to store catalog categories: {err}"),
                started_at,
            );
        }

        if let Err(err) = self
            .tracker
            .mark_updated(RefreshDomain::Categories, Utc::now())
            .await
        {
            error!(%err, "failed to persist categories refresh timestamp");
            return self.report(
                SyncStatus::Failed,
                tree.len() as u32,
                tree.len() as u32,
                1,
                &format!("Categories stored but refresh state not persisted: {err}"),
                started_at,
            );
        }

        info!(categories = tree.len(), "categories refresh complete");
        self.report(
            SyncStatus::Completed,
            tree.len() as u32,
            tree.len() as u32,
            0,
            "Successfully updated catalog category info.",
            started_at,
        )
    }

    /// Re-crawl every (category, subcategory) listing and reconcile the
    /// item collection: everything starts unlisted, rediscovered items are
    /// re-marked listed with freshly scraped fields.
    pub async fn refresh_items(&self, cancel: &CancellationToken) -> SyncReport {
        let started_at = Utc::now();

        // Best-effort soft delete; rediscovered items are re-listed as the
        // crawl walks the tree.
        match self.items.unlist_all().await {
            Ok(touched) => info!(touched, "marked stored items unlisted"),
            Err(err) => warn!(%err, "failed to unlist stored items, continuing"),
        }

        // Without the taxonomy there is nothing to walk; this is the one
        // fatal failure of an items refresh.
        let tree = match self.categories.find_all().await {
            Ok(tree) => tree,
            Err(err) => {
                error!(%err, "failed to read category tree");
                return self.report(
                    SyncStatus::Failed,
                    0,
                    0,
                    1,
                    &format!("Failed to read the category tree: {err}"),
                    started_at,
                );
            }
        };

        // Advisory denominator from the last categories scrape; the actual
        // number of discovered items may diverge.
        let total: u32 = tree
            .iter()
            .flat_map(|category| category.subcategories.iter())
            .map(|subcategory| subcategory.item_count)
            .sum();
        info!(total, "expected item count from stored taxonomy");

        let mut processed = 0u32;
        let mut errors = 0u32;

        for category in &tree {
            for subcategory in &category.subcategories {
                if cancel.is_cancelled() {
                    info!(processed, "items refresh cancelled between subcategories");
                    return self.report(
                        SyncStatus::Cancelled,
                        processed,
                        total,
                        errors,
                        "Item update cancelled.",
                        started_at,
                    );
                }

                pause_with_jitter(self.config.listing_jitter_ms).await;
                info!(category = %category.name, subcategory = %subcategory.name, "fetching listing");

                let request = ListingRequest {
                    queue: amazon_vine::Queue::AvailableForAll,
                    size: subcategory.item_count,
                    page: 1,
                    parent_node: Some(category.node_id.clone()),
                    child_node: Some(subcategory.node_id.clone()),
                };

                let stubs = match self.client.fetch_listing(&request).await {
                    Ok(page) => match self.extractor.extract_item_stubs(&page.html) {
                        Ok(stubs) => stubs,
                        Err(err) => {
                            warn!(%err, subcategory = %subcategory.name, "listing parse failed, skipping subcategory");
                            errors += 1;
                            continue;
                        }
                    },
                    Err(err) => {
                        warn!(%err, subcategory = %subcategory.name, "listing fetch failed, skipping subcategory");
                        errors += 1;
                        continue;
                    }
                };

                for (index, stub) in stubs.into_iter().enumerate() {
                    let mut item =
                        stub.into_item(&category.name, &subcategory.name, index as u32 + 1);

                    match self.thumbnails.ensure(&item.thumbnail).await {
                        Ok(path) => item.thumbnail = path.display().to_string(),
                        Err(err) => {
                            // The item keeps its remote URL for this cycle.
                            warn!(%err, item = %item.id, "thumbnail resolution failed");
                        }
                    }

                    match self.put_with_retry(&item).await {
                        Ok(revision) => item.revision = Some(revision),
                        Err(err) => {
                            warn!(%err, item = %item.id, "item write failed, skipping for this cycle");
                            errors += 1;
                        }
                    }

                    // Progress advances regardless of the write outcome.
                    processed += 1;
                    let _ = self.events.send(SyncEvent::ItemProgress {
                        item,
                        current: processed,
                        total,
                    });
                }
            }
        }

        if let Err(err) = self
            .tracker
            .mark_updated(RefreshDomain::Items, Utc::now())
            .await
        {
            error!(%err, "failed to persist items refresh timestamp");
            return self.report(
                SyncStatus::Failed,
                processed,
                total,
                errors + 1,
                &format!("Items stored but refresh state not persisted: {err}"),
                started_at,
            );
        }

        info!(processed, errors, "items refresh complete");
        self.report(
            SyncStatus::Completed,
            processed,
            total,
            errors,
            &format!("Successfully retrieved {total} updated catalog items."),
            started_at,
        )
    }

    /// Conflict-safe upsert: insert fresh, and on a revision conflict
    /// re-read the latest stored revision and retry the write exactly once
    /// (last-writer-wins after one retry, never unbounded).
    async fn put_with_retry(&self, item: &VineItem) -> Result<String, CrawlError> {
        match self.items.put(item).await {
            Ok(revision) => Ok(revision),
            Err(err) if err.is_conflict() => {
                let latest = self.items.find_by_id(&item.id).await?;
                let mut corrected = item.clone();
                corrected.revision = latest.and_then(|existing| existing.revision);
                self.items.put(&corrected).await
            }
            Err(other) => Err(other),
        }
    }

    fn emit_category_progress(&self, message: &str) {
        let _ = self.events.send(SyncEvent::CategoryProgress {
            message: message.to_string(),
        });
    }

    fn report(
        &self,
        status: SyncStatus,
        processed: u32,
        total: u32,
        errors: u32,
        message: &str,
        started_at: chrono::DateTime<Utc>,
    ) -> SyncReport {
        SyncReport {
            status,
            processed,
            total,
            errors,
            message: message.to_string(),
            started_at,
            completed_at: Utc::now(),
        }
    }
}
