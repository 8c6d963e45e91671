//! Domain entities
//!
//! Contains the core business entities for the Vine catalog: the two-level
//! category taxonomy and the item records reconciled into the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level browse category discovered from the catalog navigation widget.
///
/// Identity is the category `name`; the whole tree is replaced on every
/// categories refresh, so there is no per-category merge logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Opaque node identifier (`pn` query parameter on the site).
    pub node_id: String,
    pub item_count: u32,
    pub subcategories: Vec<Subcategory>,
}

/// A second-level browse node owned by exactly one [`Category`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub name: String,
    /// Opaque node identifier (`cn` query parameter on the site).
    pub node_id: String,
    pub item_count: u32,
}

/// An item record as kept in the local store.
///
/// Identity is the composite recommendation id scraped from the listing
/// tile. `listed` is the only field that distinguishes a currently offered
/// item from one seen in an earlier refresh; records are never physically
/// removed outside the explicit wipe operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VineItem {
    /// Composite recommendation identifier, e.g. `"seg#query#ASIN#seg"`.
    pub id: String,
    pub query: String,
    pub asin: String,
    pub product_name: String,
    /// Local cache path once the thumbnail has been resolved, otherwise the
    /// remote URL from the listing tile.
    pub thumbnail: String,
    pub category: String,
    pub subcategory: String,
    /// 1-based rank within the (category, subcategory) listing.
    pub position: u32,
    pub listed: bool,
    /// Optimistic-concurrency token assigned by the store on every
    /// successful write. `None` for a record that has never been stored.
    pub revision: Option<String>,
}

/// Partial item data extracted from one listing-grid tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStub {
    pub id: String,
    pub query: String,
    pub asin: String,
    pub product_name: String,
    pub thumbnail_url: String,
}

impl ItemStub {
    /// Promote a stub to a full item record for the given listing slot.
    ///
    /// `position` is 1-based and assigned by the caller from the tile's
    /// index within the page; newly discovered items are always listed.
    pub fn into_item(self, category: &str, subcategory: &str, position: u32) -> VineItem {
        VineItem {
            id: self.id,
            query: self.query,
            asin: self.asin,
            product_name: self.product_name,
            thumbnail: self.thumbnail_url,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            position,
            listed: true,
            revision: None,
        }
    }
}

/// The two independently refreshed data domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshDomain {
    Categories,
    Items,
}

impl RefreshDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshDomain::Categories => "categories",
            RefreshDomain::Items => "items",
        }
    }
}

/// Per-domain refresh bookkeeping, persisted outside the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshState {
    pub last_update: DateTime<Utc>,
}

impl Default for RefreshState {
    fn default() -> Self {
        // Epoch start so a fresh install is immediately refreshable.
        Self {
            last_update: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}
