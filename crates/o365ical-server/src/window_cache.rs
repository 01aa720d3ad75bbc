//! Per-user cache of the extended calendar horizon.
//!
//! Entries hold the raw Graph records of one `(user, window)` key plus the
//! time they were fetched. Freshness is only judged by the refresher; the
//! request path serves whatever is stored.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use o365ical_core::TimeWindow;
use o365ical_providers::GraphEvent;
use tracing::debug;

use crate::store::{Storage, StoreResult};

/// Default time after which an entry is refetched.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cached window as read back from storage.
#[derive(Debug, Clone)]
pub struct CachedWindow {
    /// Raw event records of the window.
    pub events: Vec<GraphEvent>,
    /// When the entry was last refreshed.
    pub refreshed_at: DateTime<Utc>,
}

impl CachedWindow {
    /// Age of the entry at `now`, zero if the clock went backwards.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.refreshed_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true if the entry is older than `ttl` at `now`.
    pub fn is_stale_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) >= ttl
    }
}

/// Window cache on top of the shared store.
#[derive(Clone)]
pub struct WindowCache {
    store: Arc<dyn Storage>,
    ttl: Duration,
}

impl std::fmt::Debug for WindowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl WindowCache {
    /// Creates a cache with the given TTL.
    pub fn new(store: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Loads the entry for `(user, window)`.
    ///
    /// Fails with `NotFound` when no entry exists for that exact key.
    pub fn get(&self, user: &str, window: &TimeWindow) -> StoreResult<CachedWindow> {
        let stored = self.store.load_window(user, window)?;
        let events: Vec<GraphEvent> = serde_json::from_str(&stored.contents)?;
        Ok(CachedWindow {
            events,
            refreshed_at: stored.refreshed_at,
        })
    }

    /// Replaces the entry for `(user, window)` and resets its freshness.
    pub fn save(&self, user: &str, window: &TimeWindow, events: &[GraphEvent]) -> StoreResult<()> {
        self.save_at(user, window, events, Utc::now())
    }

    /// Like [`WindowCache::save`] with an explicit refresh time.
    pub fn save_at(
        &self,
        user: &str,
        window: &TimeWindow,
        events: &[GraphEvent],
        refreshed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let contents = serde_json::to_string(events)?;
        self.store
            .upsert_window(user, window, &contents, refreshed_at)?;
        debug!(user, count = events.len(), "window cache saved");
        Ok(())
    }

    /// Returns true if `(user, window)` is cached and younger than the TTL.
    ///
    /// Missing entries are not fresh; any other storage error is returned.
    pub fn is_fresh(&self, user: &str, window: &TimeWindow, now: DateTime<Utc>) -> StoreResult<bool> {
        match self.get(user, window) {
            Ok(entry) => Ok(!entry.is_stale_at(self.ttl, now)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
