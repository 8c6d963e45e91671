//! Application use cases for catalog crawling and synchronization
//!
//! The collaborator-facing surface: check/run the two refresh cycles, read
//! synced data back out, and manage settings and the wipe escape hatch.
//! Nothing here panics or propagates an error past the boundary; every
//! operation returns a structured result the collaborator can render.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::dto::{
    CategoryListDto, ItemListDto, SettingsDto, UpdateCheckDto, UpdateResultDto,
};
use crate::domain::entities::RefreshDomain;
use crate::domain::events::{EventReceiver, SyncEvent, event_channel};
use crate::domain::repositories::{CategoryRepository, ItemRepository};
use crate::infrastructure::config::{AppConfig, ConfigManager};
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::http_client::VineClient;
use crate::infrastructure::refresh_tracker::RefreshTracker;
use crate::infrastructure::repositories::{SqliteCategoryRepository, SqliteItemRepository};
use crate::infrastructure::session::SessionContext;
use crate::infrastructure::sync_engine::SyncEngine;
use crate::infrastructure::thumbnail_cache::ThumbnailCache;

/// The collaborator-facing operations over one wired engine instance.
pub struct SyncUseCases {
    engine: Arc<SyncEngine>,
    tracker: Arc<RefreshTracker>,
    categories: Arc<dyn CategoryRepository>,
    items: Arc<dyn ItemRepository>,
    config: AppConfig,
}

impl SyncUseCases {
    pub fn new(
        engine: Arc<SyncEngine>,
        tracker: Arc<RefreshTracker>,
        categories: Arc<dyn CategoryRepository>,
        items: Arc<dyn ItemRepository>,
        config: AppConfig,
    ) -> Self {
        Self {
            engine,
            tracker,
            categories,
            items,
            config,
        }
    }

    /// Wire the full stack under the platform data directory: config file,
    /// database, thumbnail cache, refresh state, and the HTTP client bound
    /// to the authenticated session.
    pub async fn bootstrap(session: SessionContext) -> Result<Self> {
        let config = ConfigManager::new()?.load().await?;
        let data_dir = ConfigManager::app_data_dir()?;

        let database_url = format!(
            "sqlite:{}",
            data_dir.join("database").join("vine.db").to_string_lossy()
        );
        let connection = DatabaseConnection::new(&database_url).await?;
        connection.migrate().await?;
        let pool = connection.pool().clone();

        let tracker = Arc::new(
            RefreshTracker::load(
                data_dir.join("refresh_state.json"),
                config.categories_interval(),
                config.items_interval(),
            )
            .await?,
        );

        let categories: Arc<dyn CategoryRepository> =
            Arc::new(SqliteCategoryRepository::new(pool.clone()));
        let items: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));
        let thumbnails = Arc::new(ThumbnailCache::new(
            data_dir.join("cache"),
            config.user.max_threads,
        ));
        let client = Arc::new(
            VineClient::new(&session, &config.crawling).context("Failed to build HTTP client")?,
        );

        let engine = Arc::new(SyncEngine::new(
            client,
            Arc::clone(&categories),
            Arc::clone(&items),
            thumbnails,
            Arc::clone(&tracker),
            config.crawling.clone(),
            event_channel(),
        ));

        Ok(Self::new(engine, tracker, categories, items, config))
    }

    /// Subscribe to progress events for the refresh operations.
    pub fn subscribe(&self) -> EventReceiver<SyncEvent> {
        self.engine.subscribe()
    }

    pub async fn check_categories_update(&self) -> UpdateCheckDto {
        self.check_update(RefreshDomain::Categories, "Category").await
    }

    pub async fn check_items_update(&self) -> UpdateCheckDto {
        self.check_update(RefreshDomain::Items, "Item").await
    }

    async fn check_update(&self, domain: RefreshDomain, label: &str) -> UpdateCheckDto {
        let can_update = self.tracker.can_refresh(domain).await;
        let next_allowed = self.tracker.next_allowed(domain).await;
        info!(
            domain = domain.as_str(),
            can_update,
            %next_allowed,
            "checked refresh gate"
        );
        UpdateCheckDto {
            success: true,
            can_update,
            message: if can_update {
                format!("{label} database is ready for an update.")
            } else {
                format!("{label} database is not ready for an update.")
            },
        }
    }

    /// Run a categories refresh, streaming `CategoryProgress` events.
    pub async fn update_categories(&self, cancel: &CancellationToken) -> UpdateResultDto {
        self.engine.refresh_categories(cancel).await.into()
    }

    /// Run an items refresh, streaming `ItemProgress` events.
    pub async fn update_items(&self, cancel: &CancellationToken) -> UpdateResultDto {
        self.engine.refresh_items(cancel).await.into()
    }

    /// Ordered list of stored categories.
    pub async fn fetch_categories(&self) -> CategoryListDto {
        match self.categories.find_all().await {
            Ok(categories) => CategoryListDto {
                success: true,
                categories,
                message: "Successfully retrieved all categories from database.".to_string(),
            },
            Err(err) => {
                error!(%err, "failed to fetch categories");
                CategoryListDto {
                    success: false,
                    categories: Vec::new(),
                    message: err.to_string(),
                }
            }
        }
    }

    /// Currently listed items only; unlisted history stays in the store
    /// but is not handed to the collaborator.
    pub async fn fetch_items(&self) -> ItemListDto {
        match self.items.find_listed().await {
            Ok(items) => ItemListDto {
                success: true,
                items,
                message: "Successfully retrieved all items from database.".to_string(),
            },
            Err(err) => {
                error!(%err, "failed to fetch items");
                ItemListDto {
                    success: false,
                    items: Vec::new(),
                    message: err.to_string(),
                }
            }
        }
    }

    pub async fn fetch_settings(&self) -> SettingsDto {
        SettingsDto {
            success: true,
            settings: Some(self.config.user.clone()),
            message: "Successfully retrieved settings.".to_string(),
        }
    }

    /// Drop and recreate the item collection, and reopen the items
    /// freshness gate so the next refresh can run immediately.
    pub async fn wipe_items(&self) -> UpdateResultDto {
        if let Err(err) = self.items.wipe().await {
            error!(%err, "failed to wipe item collection");
            return UpdateResultDto {
                success: false,
                message: err.to_string(),
            };
        }
        if let Err(err) = self.tracker.reset(RefreshDomain::Items).await {
            error!(%err, "failed to reset items refresh state");
            return UpdateResultDto {
                success: false,
                message: err.to_string(),
            };
        }
        UpdateResultDto {
            success: true,
            message: "Successfully reset the item database.".to_string(),
        }
    }
}
