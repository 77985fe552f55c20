//! Per-object timestamps that stay bounded on long-running instances.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};

use crate::models::Category;

/// Entries kept before the first prune is attempted.
const PRUNE_FLOOR: usize = 1024;

type ObjectKey = (Category, String);

/// When each object was last acted on.
///
/// Entries older than the longest window ever applied can no longer suppress
/// anything, so they are dropped once the map has doubled since the previous
/// prune. Raising a window above every earlier one does not bring back
/// entries that were already dropped.
#[derive(Debug)]
pub struct LastSeen {
    entries: HashMap<ObjectKey, DateTime<Utc>>,
    horizon: Duration,
    prune_at: usize,
}

impl Default for LastSeen {
    fn default() -> Self {
        Self { entries: HashMap::new(), horizon: Duration::ZERO, prune_at: PRUNE_FLOOR }
    }
}

impl LastSeen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that entries must be kept for at least `window`.
    pub fn widen(&mut self, window: Duration) {
        self.horizon = self.horizon.max(window);
    }

    pub fn get(&self, category: Category, identifier: &str) -> Option<DateTime<Utc>> {
        self.entries.get(&(category, identifier.to_string())).copied()
    }

    /// Stores `at` for the object and prunes if the map has grown enough.
    pub fn record(&mut self, category: Category, identifier: &str, at: DateTime<Utc>) {
        self.entries.insert((category, identifier.to_string()), at);
        if self.entries.len() >= self.prune_at {
            self.prune(at);
        }
    }

    /// Drops entries at least the longest window older than `now`. Returns
    /// how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let horizon = self.horizon;
        self.entries.retain(|_, last| match (now - *last).to_std() {
            Ok(age) => age < horizon,
            // Newer than `now`; keep.
            Err(_) => true,
        });
        self.prune_at = (self.entries.len() * 2).max(PRUNE_FLOOR);

        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = self.entries.len(), "Pruned expired object timestamps.");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.prune_at = PRUNE_FLOOR;
    }
}
