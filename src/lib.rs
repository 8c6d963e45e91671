//! Vine Tools - Amazon Vine catalog crawling and synchronization engine
//!
//! This crate discovers the Vine category taxonomy, scrapes per-category
//! item listings, caches thumbnails, and reconciles everything into a local
//! SQLite document store that distinguishes currently listed items from
//! previously seen ones. The presentation layer is an external collaborator
//! wired through [`application::use_cases::SyncUseCases`] and the broadcast
//! event channel it exposes.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the collaborator-facing surface for easier access
pub use application::dto::{
    CategoryListDto, ItemListDto, SettingsDto, UpdateCheckDto, UpdateResultDto,
};
pub use application::use_cases::SyncUseCases;
pub use domain::{Category, CrawlError, Subcategory, SyncEvent, SyncReport, SyncStatus, VineItem};
pub use infrastructure::{SessionContext, SessionGate};
