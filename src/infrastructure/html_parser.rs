//! HTML parsing and data extraction for Vine catalog pages
//!
//! Specialized extractors for the two page widgets the crawler reads: the
//! category-navigation tree and the item grid. Selectors are fixed (the
//! site's ids are stable) and cached in statics.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::{Category, ItemStub, Subcategory};
use crate::domain::errors::CrawlError;
use crate::infrastructure::config::amazon_vine;

static BROWSE_NODES_CONTAINER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#vvp-browse-nodes-container").expect("valid selector"));
static PARENT_NODE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".parent-node > a").expect("valid selector"));
static CHILD_NODE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".child-node > a").expect("valid selector"));
static NODE_COUNT_SPAN: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span").expect("valid selector"));
static ITEMS_GRID: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#vvp-items-grid").expect("valid selector"));
static ITEM_TILE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".vvp-item-tile").expect("valid selector"));
static ITEM_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".a-truncate-full").expect("valid selector"));

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid regex"));

/// Extracts structured data from Vine catalog HTML.
pub struct VineDataExtractor;

impl VineDataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the top-level categories from the navigation widget.
    ///
    /// Subcategories are left empty; the taxonomy crawler fills them in
    /// with per-category follow-up fetches.
    pub fn extract_categories(&self, html: &str) -> Result<Vec<Category>, CrawlError> {
        let document = Html::parse_document(html);
        let container = document
            .select(&BROWSE_NODES_CONTAINER)
            .next()
            .ok_or_else(|| {
                CrawlError::Parse("category navigation widget not found".to_string())
            })?;

        let categories: Vec<Category> = container
            .select(&PARENT_NODE_LINK)
            .filter_map(|link| {
                let node_id = node_id_from_link(&link, "pn")?;
                Some(Category {
                    name: element_text(&link),
                    node_id,
                    item_count: sibling_item_count(&link),
                    subcategories: Vec::new(),
                })
            })
            .collect();

        debug!(count = categories.len(), "extracted top-level categories");
        Ok(categories)
    }

    /// Extract the subcategories from a navigation widget scoped to one
    /// parent node. A category without child nodes yields an empty list,
    /// not an error.
    pub fn extract_subcategories(&self, html: &str) -> Result<Vec<Subcategory>, CrawlError> {
        let document = Html::parse_document(html);
        let container = document
            .select(&BROWSE_NODES_CONTAINER)
            .next()
            .ok_or_else(|| {
                CrawlError::Parse("category navigation widget not found".to_string())
            })?;

        let subcategories: Vec<Subcategory> = container
            .select(&CHILD_NODE_LINK)
            .filter_map(|link| {
                let node_id = node_id_from_link(&link, "cn")?;
                Some(Subcategory {
                    name: element_text(&link),
                    node_id,
                    item_count: sibling_item_count(&link),
                })
            })
            .collect();

        debug!(count = subcategories.len(), "extracted subcategories");
        Ok(subcategories)
    }

    /// Extract item stubs from the listing grid, in on-page order.
    ///
    /// The returned order determines each item's 1-based `position`; the
    /// caller assigns it as `index + 1`.
    pub fn extract_item_stubs(&self, html: &str) -> Result<Vec<ItemStub>, CrawlError> {
        let document = Html::parse_document(html);
        let grid = document
            .select(&ITEMS_GRID)
            .next()
            .ok_or_else(|| CrawlError::Parse("item grid not found".to_string()))?;

        let mut stubs = Vec::new();
        for tile in grid.select(&ITEM_TILE) {
            match stub_from_tile(&tile) {
                Some(stub) => stubs.push(stub),
                None => warn!("skipping malformed item tile"),
            }
        }

        debug!(count = stubs.len(), "extracted item stubs");
        Ok(stubs)
    }
}

impl Default for VineDataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn stub_from_tile(tile: &ElementRef<'_>) -> Option<ItemStub> {
    let full_id = tile.value().attr("data-recommendation-id")?;
    let thumbnail_url = tile.value().attr("data-img-url")?;

    // Composite identifier: opaque segment, query, ASIN, opaque segment.
    let mut segments = full_id.split('#');
    let _ = segments.next()?;
    let query = segments.next()?;
    let asin = segments.next()?;

    let product_name = tile
        .select(&ITEM_NAME)
        .next()
        .map(|name| element_text(&name))
        .unwrap_or_default();

    Some(ItemStub {
        id: full_id.to_string(),
        query: query.to_string(),
        asin: asin.to_string(),
        product_name,
        thumbnail_url: thumbnail_url.to_string(),
    })
}

/// Pull a node identifier out of a navigation link's query string. Links
/// are relative, so they are resolved against the catalog URL first.
fn node_id_from_link(link: &ElementRef<'_>, param: &str) -> Option<String> {
    let href = link.value().attr("href")?;
    let base = Url::parse(amazon_vine::CATALOG_URL).ok()?;
    let resolved = base.join(href).ok()?;
    resolved
        .query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
}

/// The item count is rendered in a `<span>` next to the link; strip
/// everything but digits (the site formats counts as "(1,234)").
fn sibling_item_count(link: &ElementRef<'_>) -> u32 {
    let parent = link.parent().and_then(ElementRef::wrap);
    parent
        .and_then(|parent| {
            parent.select(&NODE_COUNT_SPAN).next().map(|span| {
                let text = element_text(&span);
                NON_DIGITS.replace_all(&text, "").parse().unwrap_or(0)
            })
        })
        .unwrap_or(0)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
