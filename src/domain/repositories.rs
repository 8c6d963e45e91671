//! Repository interfaces for the catalog document store
//!
//! Contains trait definitions for data access so the sync engine can be
//! exercised against in-memory implementations in tests. Errors are typed:
//! a rejected optimistic-concurrency write must be distinguishable from a
//! collection-level failure.

use async_trait::async_trait;

use crate::domain::entities::{Category, VineItem};
use crate::domain::errors::CrawlError;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Replace the whole category collection with a freshly crawled tree.
    ///
    /// Destructive by design: categories absent from the new tree are
    /// dropped, there is no per-category merge.
    async fn replace_all(&self, categories: &[Category]) -> Result<(), CrawlError>;

    /// All categories in discovery order.
    async fn find_all(&self) -> Result<Vec<Category>, CrawlError>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Conflict-safe write keyed by item identity.
    ///
    /// With `revision = None` the item must not exist yet; with a revision
    /// the stored revision must match. Either violation yields
    /// [`CrawlError::Conflict`]. Returns the revision assigned to the
    /// written row.
    async fn put(&self, item: &VineItem) -> Result<String, CrawlError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<VineItem>, CrawlError>;

    async fn find_all(&self) -> Result<Vec<VineItem>, CrawlError>;

    /// Items found by the most recent refresh.
    async fn find_listed(&self) -> Result<Vec<VineItem>, CrawlError>;

    /// Mark every stored item unlisted in a single bulk write. Returns the
    /// number of rows touched.
    async fn unlist_all(&self) -> Result<u64, CrawlError>;

    /// Drop and recreate the item collection. The only physical deletion
    /// path; `listed = false` is the soft delete everywhere else.
    async fn wipe(&self) -> Result<(), CrawlError>;
}
