//! Infrastructure layer for HTTP, parsing, storage, and external integrations
//!
//! Provides the authenticated session gate, the rate-limited HTTP client,
//! HTML extraction, the SQLite document store, the thumbnail cache, the
//! refresh freshness gate, and the sync engine that orchestrates them.

pub mod config;
pub mod database_connection;
pub mod html_parser;
pub mod http_client;
pub mod logging;
pub mod refresh_tracker;
pub mod repositories;
pub mod session;
pub mod sync_engine;
pub mod taxonomy_crawler;
pub mod thumbnail_cache;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, amazon_vine};
pub use database_connection::DatabaseConnection;
pub use html_parser::VineDataExtractor;
pub use http_client::{CatalogClient, ListingRequest, VineClient, VinePage};
pub use logging::{get_log_directory, init_logging, init_logging_with_file};
pub use refresh_tracker::RefreshTracker;
pub use repositories::{SqliteCategoryRepository, SqliteItemRepository};
pub use session::{BrowserShell, SessionContext, SessionGate};
pub use sync_engine::SyncEngine;
pub use taxonomy_crawler::TaxonomyCrawler;
pub use thumbnail_cache::{ThumbnailCache, ThumbnailStore};
