//! Event types for real-time communication between the engine and the
//! presentation collaborator
//!
//! Progress events are broadcast while a refresh runs so any number of
//! subscribers (toasts, progress bars, logs) can follow along without the
//! engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::entities::VineItem;

/// Event channel: status-change broadcast to any number of subscribers.
pub type EventChannel<T> = broadcast::Sender<T>;
pub type EventReceiver<T> = broadcast::Receiver<T>;

const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

/// Create an event channel with the standard buffer size.
#[must_use]
pub fn event_channel<T: Clone>() -> EventChannel<T> {
    broadcast::channel(DEFAULT_EVENT_BUFFER_SIZE).0
}

/// Progress notifications emitted during a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// One step of the category taxonomy crawl finished.
    CategoryProgress { message: String },
    /// One item was processed during an items refresh. `total` is the
    /// advisory denominator from the last categories scrape and may diverge
    /// from the number of items actually discovered.
    ItemProgress {
        item: VineItem,
        current: u32,
        total: u32,
    },
}

/// Terminal state of one refresh invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of one refresh invocation, returned to the caller once the
/// crawl sequence has terminated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Items (or categories) actually processed this cycle.
    pub processed: u32,
    /// Advisory expected total, taken from the stored taxonomy.
    pub total: u32,
    /// Per-item / per-page failures that were isolated and skipped.
    pub errors: u32,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_all_subscribers() {
        let tx = event_channel::<SyncEvent>();
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        tx.send(SyncEvent::CategoryProgress {
            message: "Scraping subcategories of Electronics...".to_string(),
        })
        .unwrap();

        assert!(matches!(
            rx1.try_recv().unwrap(),
            SyncEvent::CategoryProgress { .. }
        ));
        assert!(matches!(
            rx2.try_recv().unwrap(),
            SyncEvent::CategoryProgress { .. }
        ));
    }

    #[test]
    fn report_success_flag_follows_status() {
        let now = Utc::now();
        let report = SyncReport {
            status: SyncStatus::Cancelled,
            processed: 3,
            total: 10,
            errors: 0,
            message: "cancelled between subcategories".to_string(),
            started_at: now,
            completed_at: now,
        };
        assert!(!report.succeeded());
    }
}
