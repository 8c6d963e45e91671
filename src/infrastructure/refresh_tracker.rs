//! Refresh freshness gate and persisted refresh state
//!
//! Tracks when each data domain (categories, items) last completed a
//! refresh and decides whether another one is currently permitted. The
//! timestamps live in a small JSON file next to the database, independent
//! of the document store; they are written exactly once per successful
//! refresh, by the engine that ran it.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::entities::{RefreshDomain, RefreshState};

/// The TTL rule: a refresh is permitted from the exact moment the minimum
/// interval has elapsed (boundary inclusive).
pub fn refresh_permitted(
    now: DateTime<Utc>,
    last_update: DateTime<Utc>,
    min_interval: Duration,
) -> bool {
    now >= last_update + min_interval
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RefreshStateFile {
    categories: RefreshState,
    items: RefreshState,
}

/// Freshness gate over the persisted per-domain refresh timestamps.
pub struct RefreshTracker {
    state_path: PathBuf,
    state: RwLock<RefreshStateFile>,
    categories_interval: Duration,
    items_interval: Duration,
}

impl RefreshTracker {
    /// Load the state file, starting from the epoch defaults when missing.
    /// The intervals passed in are expected to be floor-clamped already
    /// (see `AppConfig::categories_interval` / `items_interval`).
    pub async fn load(
        state_path: PathBuf,
        categories_interval: Duration,
        items_interval: Duration,
    ) -> Result<Self> {
        let state = if state_path.exists() {
            let content = fs::read_to_string(&state_path)
                .await
                .context("Failed to read refresh state file")?;
            serde_json::from_str(&content).context("Failed to parse refresh state file")?
        } else {
            RefreshStateFile::default()
        };

        Ok(Self {
            state_path,
            state: RwLock::new(state),
            categories_interval,
            items_interval,
        })
    }

    fn interval(&self, domain: RefreshDomain) -> Duration {
        match domain {
            RefreshDomain::Categories => self.categories_interval,
            RefreshDomain::Items => self.items_interval,
        }
    }

    pub async fn last_update(&self, domain: RefreshDomain) -> DateTime<Utc> {
        let state = self.state.read().await;
        match domain {
            RefreshDomain::Categories => state.categories.last_update,
            RefreshDomain::Items => state.items.last_update,
        }
    }

    /// Earliest instant the next refresh of `domain` is permitted.
    pub async fn next_allowed(&self, domain: RefreshDomain) -> DateTime<Utc> {
        self.last_update(domain).await + self.interval(domain)
    }

    pub async fn can_refresh(&self, domain: RefreshDomain) -> bool {
        self.can_refresh_at(domain, Utc::now()).await
    }

    pub async fn can_refresh_at(&self, domain: RefreshDomain, now: DateTime<Utc>) -> bool {
        refresh_permitted(now, self.last_update(domain).await, self.interval(domain))
    }

    /// Record a successful refresh of `domain` and persist immediately.
    pub async fn mark_updated(&self, domain: RefreshDomain, now: DateTime<Utc>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match domain {
                RefreshDomain::Categories => state.categories.last_update = now,
                RefreshDomain::Items => state.items.last_update = now,
            }
        }
        self.persist().await?;
        info!(domain = domain.as_str(), %now, "recorded refresh completion");
        Ok(())
    }

    /// Reset a domain to the epoch default (used by the wipe operation).
    pub async fn reset(&self, domain: RefreshDomain) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match domain {
                RefreshDomain::Categories => state.categories = RefreshState::default(),
                RefreshDomain::Items => state.items = RefreshState::default(),
            }
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create refresh state directory")?;
        }
        let content = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state).context("Failed to serialize refresh state")?
        };
        fs::write(&self.state_path, content)
            .await
            .context("Failed to write refresh state file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> Duration {
        Duration::days(1)
    }

    async fn tracker(dir: &tempfile::TempDir) -> RefreshTracker {
        RefreshTracker::load(dir.path().join("refresh_state.json"), Duration::days(7), day())
            .await
            .unwrap()
    }

    #[test]
    fn boundary_instant_is_permitted() {
        let last = Utc::now();
        assert!(refresh_permitted(last + day(), last, day()));
        assert!(!refresh_permitted(last + day() - Duration::seconds(1), last, day()));
        assert!(refresh_permitted(last + day() + Duration::seconds(1), last, day()));
    }

    proptest! {
        #[test]
        fn gate_matches_the_arithmetic_definition(
            last_secs in 0i64..4_000_000_000,
            interval_secs in 0i64..400_000_000,
            elapsed_secs in 0i64..500_000_000,
        ) {
            let last = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(last_secs);
            let interval = Duration::seconds(interval_secs);
            let now = last + Duration::seconds(elapsed_secs);
            prop_assert_eq!(
                refresh_permitted(now, last, interval),
                elapsed_secs >= interval_secs
            );
        }
    }

    #[tokio::test]
    async fn fresh_install_is_immediately_refreshable() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        assert!(tracker.can_refresh(RefreshDomain::Categories).await);
        assert!(tracker.can_refresh(RefreshDomain::Items).await);
    }

    #[tokio::test]
    async fn completed_refresh_closes_the_gate_until_the_interval_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let now = Utc::now();

        tracker.mark_updated(RefreshDomain::Items, now).await.unwrap();

        assert!(!tracker.can_refresh_at(RefreshDomain::Items, now).await);
        assert!(
            !tracker
                .can_refresh_at(RefreshDomain::Items, now + Duration::hours(23))
                .await
        );
        assert!(tracker.can_refresh_at(RefreshDomain::Items, now + day()).await);
        // The other domain is unaffected.
        assert!(tracker.can_refresh_at(RefreshDomain::Categories, now).await);
    }

    #[tokio::test]
    async fn state_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        {
            let tracker = tracker(&dir).await;
            tracker.mark_updated(RefreshDomain::Items, now).await.unwrap();
        }

        let reloaded = tracker(&dir).await;
        assert!(!reloaded.can_refresh_at(RefreshDomain::Items, now).await);
        assert_eq!(reloaded.last_update(RefreshDomain::Items).await, now);
    }

    #[tokio::test]
    async fn reset_reopens_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let now = Utc::now();
        tracker.mark_updated(RefreshDomain::Items, now).await.unwrap();

        tracker.reset(RefreshDomain::Items).await.unwrap();
        assert!(tracker.can_refresh_at(RefreshDomain::Items, now).await);
    }
}
