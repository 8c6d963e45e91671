//! Domain module - Core business logic and entities
//!
//! This module contains the domain entities, the login-flow state machine,
//! the error taxonomy, and the repository interfaces the sync engine is
//! written against.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod entities;
pub mod errors;
pub mod events;
pub mod login_flow;
pub mod repositories;

// Re-export commonly used items for convenience
pub use entities::{Category, ItemStub, RefreshDomain, RefreshState, Subcategory, VineItem};
pub use errors::CrawlError;
pub use events::{SyncEvent, SyncReport, SyncStatus};
pub use login_flow::{LoginAction, LoginEndpoints, LoginFlow, LoginState};
pub use repositories::{CategoryRepository, ItemRepository};
