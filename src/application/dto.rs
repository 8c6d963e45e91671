//! Data Transfer Objects for the collaborator-facing operations
//!
//! Every operation returns a structured result with a success flag and a
//! human-readable message; on failure the collaborator is expected to offer
//! a retry of the same operation.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Category, VineItem};
use crate::domain::events::SyncReport;
use crate::infrastructure::config::UserConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCheckDto {
    pub success: bool,
    pub can_update: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResultDto {
    pub success: bool,
    pub message: String,
}

impl From<SyncReport> for UpdateResultDto {
    fn from(report: SyncReport) -> Self {
        Self {
            success: report.succeeded(),
            message: report.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryListDto {
    pub success: bool,
    pub categories: Vec<Category>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemListDto {
    pub success: bool,
    pub items: Vec<VineItem>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDto {
    pub success: bool,
    pub settings: Option<UserConfig>,
    pub message: String,
}
