//! Configuration infrastructure
//!
//! Contains configuration loading and management for Vine catalog crawling,
//! plus the fixed site constants the crawler is pointed at.
//!
//! Settings are kept in a JSON file under the platform config directory and
//! clamped to safe bounds on load; interval floors in particular can never
//! be undercut by an edited config file.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-configurable settings (exposed to the collaborator UI).
    pub user: UserConfig,

    /// Crawl pacing and refresh policy.
    pub crawling: CrawlingConfig,
}

/// User-configurable settings that the collaborator's settings form edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Worker cap for bulk thumbnail prefetching.
    pub max_threads: usize,

    /// Page-size hint for the collaborator's own pagination.
    pub items_per_page: u32,
}

/// Crawl pacing and refresh-policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlingConfig {
    /// Jitter range before each subcategory taxonomy fetch, milliseconds.
    pub category_jitter_ms: (u64, u64),

    /// Jitter range before each listing fetch during an items refresh,
    /// milliseconds.
    pub listing_jitter_ms: (u64, u64),

    /// Requested minimum interval between categories refreshes, ms.
    /// Clamped to at least [`limits::CATEGORIES_INTERVAL_FLOOR_MS`].
    pub categories_interval_ms: i64,

    /// Requested minimum interval between items refreshes, ms.
    /// Clamped to at least [`limits::ITEMS_INTERVAL_FLOOR_MS`].
    pub items_interval_ms: i64,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Rate cap for the HTTP fetcher, requests per second.
    pub max_requests_per_second: u32,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            max_threads: limits::DEFAULT_MAX_THREADS,
            items_per_page: limits::DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            category_jitter_ms: (1000, 1500),
            listing_jitter_ms: (500, 1500),
            categories_interval_ms: limits::CATEGORIES_INTERVAL_FLOOR_MS,
            items_interval_ms: limits::ITEMS_INTERVAL_FLOOR_MS,
            request_timeout_seconds: 30,
            max_requests_per_second: 2,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: UserConfig::default(),
            crawling: CrawlingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Clamp every bounded setting into its legal range.
    pub fn clamped(mut self) -> Self {
        self.user.max_threads = self
            .user
            .max_threads
            .clamp(limits::MIN_THREADS, limits::MAX_THREADS);
        self.crawling.categories_interval_ms = self
            .crawling
            .categories_interval_ms
            .max(limits::CATEGORIES_INTERVAL_FLOOR_MS);
        self.crawling.items_interval_ms = self
            .crawling
            .items_interval_ms
            .max(limits::ITEMS_INTERVAL_FLOOR_MS);
        self
    }

    /// Effective categories refresh interval, floor applied.
    pub fn categories_interval(&self) -> Duration {
        Duration::milliseconds(
            self.crawling
                .categories_interval_ms
                .max(limits::CATEGORIES_INTERVAL_FLOOR_MS),
        )
    }

    /// Effective items refresh interval, floor applied.
    pub fn items_interval(&self) -> Duration {
        Duration::milliseconds(
            self.crawling
                .items_interval_ms
                .max(limits::ITEMS_INTERVAL_FLOOR_MS),
        )
    }
}

/// Manages the configuration file and the application data directories.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("vine-tools");
        Ok(Self {
            config_path: config_dir.join("config.json"),
        })
    }

    /// Build a manager over an explicit config file path (tests, portable
    /// installs).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Application data directory for the database, thumbnail cache, and
    /// refresh-state file.
    pub fn app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join("vine-tools");
        Ok(data_dir)
    }

    /// Load configuration from file, creating the default if missing.
    /// Out-of-range values are clamped, never rejected.
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(path = ?self.config_path, "configuration file not found, creating default");
            let config = AppConfig::default();
            self.save(&config).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;
        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse configuration file")?;
        Ok(config.clamped())
    }

    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
        }
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;
        info!(path = ?self.config_path, "saved configuration");
        Ok(())
    }
}

/// Bounds for user-editable settings and the refresh-policy floors.
pub mod limits {
    pub const MIN_THREADS: usize = 1;
    pub const MAX_THREADS: usize = 50;
    pub const DEFAULT_MAX_THREADS: usize = 5;

    /// The standard amount of items on each catalog page.
    pub const DEFAULT_ITEMS_PER_PAGE: u32 = 60;

    /// One week; categories may never be refreshed more often than this.
    pub const CATEGORIES_INTERVAL_FLOOR_MS: i64 = 7 * 24 * 60 * 60 * 1000;

    /// One day; items may never be refreshed more often than this.
    pub const ITEMS_INTERVAL_FLOOR_MS: i64 = 24 * 60 * 60 * 1000;
}

/// Fixed Vine site endpoints and queue names.
pub mod amazon_vine {
    /// Catalog listing page, also the login-state probe target.
    pub const CATALOG_URL: &str = "https://www.amazon.com/vine/vine-items";

    /// Sign-in form.
    pub const SIGN_IN_URL: &str = "https://www.amazon.com/gp/sign-in.html";

    /// Sign-in verification/challenge page.
    pub const CHALLENGE_URL: &str = "https://www.amazon.com/ap/cvf/approval";

    /// Post-login landing page.
    pub const HOME_URL: &str = "https://www.amazon.com/gp/css/homepage.html";

    /// Recommendations detail endpoint; item id and ASIN are appended as
    /// `/{id}/item/{asin}`.
    pub const RECOMMENDATIONS_URL: &str = "https://www.amazon.com/vine/api/recommendations";

    /// Named remote listing modes determining which subset of the catalog
    /// is visible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Queue {
        /// Items recommended to this account ("potluck").
        Recommended,
        /// Items available to everyone ("last_chance").
        AvailableForAll,
        /// Additional items ("encore").
        Additional,
    }

    impl Queue {
        pub fn as_str(&self) -> &'static str {
            match self {
                Queue::Recommended => "potluck",
                Queue::AvailableForAll => "last_chance",
                Queue::Additional => "encore",
            }
        }
    }
}
