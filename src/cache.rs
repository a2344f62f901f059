//! The match cache: category-keyed, mode-keyed assignments with
//! size-based invalidation and write-through persistence.
//!
//! Only finalizer threads mutate the cache. Concurrent finalizers for
//! different (category, mode) keys are fine, but the whole
//! read-modify-write-then-persist step runs under one mutex so persisted
//! writes never interleave.

use crate::catalogue::CatalogueMode;
use crate::checklist::CategoryAssignment;
use crate::store::CacheStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store namespace the cache persists under.
pub const CACHE_NAMESPACE: &str = "color_matches";

/// Per-mode category maps, persisted as `matchesByCategory`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchesByMode {
    #[serde(default)]
    pub normal: HashMap<String, CategoryAssignment>,
    #[serde(default)]
    pub fade: HashMap<String, CategoryAssignment>,
}

impl MatchesByMode {
    pub fn mode(&self, mode: CatalogueMode) -> &HashMap<String, CategoryAssignment> {
        match mode {
            CatalogueMode::Normal => &self.normal,
            CatalogueMode::Fade => &self.fade,
        }
    }

    fn mode_mut(&mut self, mode: CatalogueMode) -> &mut HashMap<String, CategoryAssignment> {
        match mode {
            CatalogueMode::Normal => &mut self.normal,
            CatalogueMode::Fade => &mut self.fade,
        }
    }
}

/// The persisted cache document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCache {
    #[serde(default)]
    pub matches_by_category: MatchesByMode,
    #[serde(default)]
    pub inventory_size: usize,
    /// Epoch millis of the last committed write.
    #[serde(default)]
    pub last_updated: u64,
}

impl MatchCache {
    pub fn get(&self, mode: CatalogueMode, category: &str) -> Option<&CategoryAssignment> {
        self.matches_by_category.mode(mode).get(category)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Synchronized cache plus its backing store.
pub struct CacheHandle {
    state: Mutex<MatchCache>,
    store: Arc<dyn CacheStore>,
}

impl CacheHandle {
    /// Load any previous session's cache from the store; a missing or
    /// unreadable document degrades to an empty cache with a warning.
    pub fn load_or_default(store: Arc<dyn CacheStore>) -> Self {
        let state = match store.load(CACHE_NAMESPACE) {
            Ok(Some(value)) => match serde_json::from_value::<MatchCache>(value) {
                Ok(cache) => cache,
                Err(err) => {
                    log::warn!("discarding unreadable match cache: {err}");
                    MatchCache::default()
                }
            },
            Ok(None) => MatchCache::default(),
            Err(err) => {
                log::warn!("match cache load failed, starting empty: {err}");
                MatchCache::default()
            }
        };
        Self {
            state: Mutex::new(state),
            store,
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, MatchCache> {
        // A poisoned lock only means a finalizer panicked mid-write; the
        // cached data itself is still the last consistent snapshot.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn lookup(&self, mode: CatalogueMode, category: &str) -> Option<CategoryAssignment> {
        self.locked().get(mode, category).cloned()
    }

    pub fn inventory_size(&self) -> usize {
        self.locked().inventory_size
    }

    /// Insert the empty placeholder entry the instant computation starts,
    /// so pollers render pending rows instead of "unknown category".
    pub fn insert_placeholder(&self, mode: CatalogueMode, category: &str, target_count: usize) {
        let mut cache = self.locked();
        cache
            .matches_by_category
            .mode_mut(mode)
            .insert(category.to_string(), CategoryAssignment::placeholder(target_count));
    }

    /// Commit a finished assignment and persist the whole document.
    ///
    /// Persistence failure is reported but does not roll back: the
    /// in-memory result stays usable for the rest of the session.
    pub fn commit(
        &self,
        mode: CatalogueMode,
        category: &str,
        assignment: CategoryAssignment,
        inventory_size: usize,
    ) -> Result<(), String> {
        let mut cache = self.locked();
        cache
            .matches_by_category
            .mode_mut(mode)
            .insert(category.to_string(), assignment);
        cache.inventory_size = inventory_size;
        cache.last_updated = epoch_millis();
        self.persist(&cache)
    }

    /// Clear both mode caches if the observed inventory size differs from
    /// the size the cache was computed against. Returns whether anything
    /// was invalidated.
    pub fn invalidate_if_changed(&self, new_size: usize) -> bool {
        let mut cache = self.locked();
        if cache.inventory_size == new_size {
            return false;
        }
        log::info!(
            "inventory size changed ({} -> {}), clearing cached matches",
            cache.inventory_size,
            new_size
        );
        cache.matches_by_category = MatchesByMode::default();
        cache.inventory_size = new_size;
        cache.last_updated = epoch_millis();
        if let Err(err) = self.persist(&cache) {
            log::warn!("could not persist cleared match cache: {err}");
        }
        true
    }

    fn persist(&self, cache: &MatchCache) -> Result<(), String> {
        let value = serde_json::to_value(cache).map_err(|err| err.to_string())?;
        self.store.save(CACHE_NAMESPACE, &value)
    }
}
