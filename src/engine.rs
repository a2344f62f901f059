//! Public facade wiring the inventory, catalogue, scheduler and cache
//! together for the UI/command layer.
//!
//! Every operation here is poll-friendly: nothing blocks the caller, and
//! nothing raises an unrecoverable fault. Even a fully empty or corrupt
//! inventory leaves the engine interactive.

use crate::cache::CacheHandle;
use crate::catalogue::{Catalogue, CatalogueMode};
use crate::checklist::CategoryAssignment;
use crate::inventory::{InventorySnapshot, InventorySource};
use crate::scheduler::ComputationScheduler;
use crate::sets::{self, BestSet};
use crate::store::CacheStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a non-blocking match request.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryMatches {
    Ready(CategoryAssignment),
    Computing,
}

pub struct MatchEngine {
    inventory: Arc<dyn InventorySource>,
    catalogue: Catalogue,
    cache: Arc<CacheHandle>,
    scheduler: ComputationScheduler,
    sets_running: AtomicBool,
}

impl MatchEngine {
    /// Build the engine, reading any previous session's cache back from
    /// the store so warm results are servable immediately.
    pub fn new(
        inventory: Arc<dyn InventorySource>,
        catalogue: Catalogue,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            inventory,
            catalogue,
            cache: Arc::new(CacheHandle::load_or_default(store)),
            scheduler: ComputationScheduler::new(),
            sets_running: AtomicBool::new(false),
        }
    }

    /// Cached assignment for a category, or `Computing`, starting the
    /// computation as a side effect when it is neither cached nor in
    /// flight. Never blocks; callers poll once per frame.
    pub fn request_category_matches(
        &self,
        mode: CatalogueMode,
        category: &str,
    ) -> CategoryMatches {
        if let Some(assignment) = self.cache.lookup(mode, category) {
            if assignment.is_complete() {
                return CategoryMatches::Ready(assignment);
            }
        }
        if self.scheduler.is_computing(mode, category) {
            return CategoryMatches::Computing;
        }

        let Some(found) = self.catalogue.category(mode, category) else {
            // Unknown category: degrade to an empty, complete checklist.
            log::warn!("no {} category named '{}'", mode.label(), category);
            return CategoryMatches::Ready(CategoryAssignment::default());
        };

        let snapshot = Arc::new(InventorySnapshot::capture(self.inventory.as_ref()));
        self.scheduler.start(
            mode,
            category,
            found.targets.clone(),
            snapshot,
            self.cache.clone(),
        );
        CategoryMatches::Computing
    }

    /// `(done, total)` target counters for an in-flight computation.
    pub fn progress(&self, mode: CatalogueMode, category: &str) -> Option<(usize, usize)> {
        self.scheduler.progress(mode, category)
    }

    /// Frame-poll hook: clears every cached assignment in both modes when
    /// the inventory size changed. Returns whether anything was cleared.
    pub fn invalidate_if_grown(&self, new_size: usize) -> bool {
        self.cache.invalidate_if_changed(new_size)
    }

    /// Synchronous best-set construction over a fresh snapshot.
    ///
    /// Long-running, and independent of the match cache. A call arriving
    /// while another is in flight is rejected as a no-op.
    pub fn build_best_sets(&self) -> Option<Vec<BestSet>> {
        if self.sets_running.swap(true, Ordering::SeqCst) {
            log::warn!("best-set build already in progress, ignoring request");
            return None;
        }

        let started = Instant::now();
        let snapshot = InventorySnapshot::capture(self.inventory.as_ref());
        let sets = sets::build_best_sets(&snapshot);
        log::info!(
            "built {} best sets from {} pieces in {}ms",
            sets.len(),
            snapshot.len(),
            started.elapsed().as_millis()
        );

        self.sets_running.store(false, Ordering::SeqCst);
        Some(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Category, TargetColor};
    use crate::inventory::RawPiece;
    use crate::slots::Slot;
    use crate::store::MemoryStore;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mutable fake of the live inventory collaborator.
    struct FakeInventory {
        pieces: Mutex<Vec<RawPiece>>,
    }

    impl FakeInventory {
        fn new(pieces: Vec<RawPiece>) -> Arc<Self> {
            Arc::new(Self {
                pieces: Mutex::new(pieces),
            })
        }

        fn push(&self, piece: RawPiece) {
            self.pieces.lock().unwrap().push(piece);
        }
    }

    impl InventorySource for FakeInventory {
        fn snapshot(&self) -> Vec<RawPiece> {
            self.pieces.lock().unwrap().clone()
        }

        fn size(&self) -> usize {
            self.pieces.lock().unwrap().len()
        }
    }

    fn sample_inventory() -> Arc<FakeInventory> {
        FakeInventory::new(vec![
            RawPiece::new(1, "Ruby Helmet", "FF0000"),
            RawPiece::new(2, "Ruby Chestplate", "FE0101"),
            RawPiece::new(3, "Ruby Leggings", "FD0202"),
            RawPiece::new(4, "Ruby Boots", "FC0303"),
        ])
    }

    fn sample_catalogue() -> Catalogue {
        let all = Slot::ALL.to_vec();
        Catalogue::new(
            vec![Category::new(
                "crystal",
                vec![
                    TargetColor::new("FF0000", "Ruby", all.clone()),
                    TargetColor::new("00FF00", "Emerald", all),
                ],
            )],
            vec![Category::new(
                "ember fade",
                vec![
                    TargetColor::new("FF0000", "Stage 1", vec![Slot::Head]),
                    TargetColor::new("FE0101", "Stage 2", vec![Slot::Head]),
                ],
            )],
        )
    }

    fn engine_with(inventory: Arc<FakeInventory>) -> MatchEngine {
        MatchEngine::new(inventory, sample_catalogue(), Arc::new(MemoryStore::new()))
    }

    fn poll_ready(
        engine: &MatchEngine,
        mode: CatalogueMode,
        category: &str,
    ) -> CategoryAssignment {
        for _ in 0..500 {
            if let CategoryMatches::Ready(a) = engine.request_category_matches(mode, category) {
                return a;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("'{category}' never became ready");
    }

    #[test]
    fn test_request_computes_then_serves_from_cache() {
        let engine = engine_with(sample_inventory());

        assert_eq!(
            engine.request_category_matches(CatalogueMode::Normal, "crystal"),
            CategoryMatches::Computing
        );
        let assignment = poll_ready(&engine, CatalogueMode::Normal, "crystal");

        // Ruby target matched from the ruby outfit, emerald is missing.
        assert_eq!(
            assignment.targets[0].head.as_ref().map(|m| m.piece_id),
            Some(1)
        );
        assert!(assignment.targets[1].head.is_none());

        // Idempotent on a warm cache: same result, no new computation.
        let again = poll_ready(&engine, CatalogueMode::Normal, "crystal");
        assert_eq!(assignment, again);
        for _ in 0..500 {
            if !engine.scheduler.is_computing(CatalogueMode::Normal, "crystal") {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!engine.scheduler.is_computing(CatalogueMode::Normal, "crystal"));
    }

    #[test]
    fn test_modes_cache_independently() {
        let engine = engine_with(sample_inventory());

        let fade = poll_ready(&engine, CatalogueMode::Fade, "ember fade");
        // Both fade stages want a head: only one of the two close helmets
        // exists, so exactly one stage gets it.
        let matched: Vec<_> = fade.targets.iter().filter(|t| t.head.is_some()).collect();
        assert_eq!(matched.len(), 1);

        // The normal-mode cache is untouched by the fade run.
        assert_eq!(
            engine.request_category_matches(CatalogueMode::Normal, "crystal"),
            CategoryMatches::Computing
        );
    }

    #[test]
    fn test_unknown_category_degrades_to_empty() {
        let engine = engine_with(sample_inventory());
        let result = engine.request_category_matches(CatalogueMode::Normal, "no-such");
        assert_eq!(result, CategoryMatches::Ready(CategoryAssignment::default()));
    }

    #[test]
    fn test_invalidation_forces_recompute() {
        let inventory = sample_inventory();
        let engine = engine_with(inventory.clone());

        poll_ready(&engine, CatalogueMode::Normal, "crystal");

        // Same size: nothing happens.
        assert!(!engine.invalidate_if_grown(inventory.size()));

        inventory.push(RawPiece::new(5, "Emerald Helmet", "00FF00"));
        assert!(engine.invalidate_if_grown(inventory.size()));

        // Cache is cold again; the recompute sees the new piece.
        assert_eq!(
            engine.request_category_matches(CatalogueMode::Normal, "crystal"),
            CategoryMatches::Computing
        );
        let fresh = poll_ready(&engine, CatalogueMode::Normal, "crystal");
        assert_eq!(
            fresh.targets[1].head.as_ref().map(|m| m.piece_id),
            Some(5)
        );
    }

    #[test]
    fn test_cache_survives_engine_restart() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let inventory = sample_inventory();

        let engine = MatchEngine::new(inventory.clone(), sample_catalogue(), store.clone());
        let warm = poll_ready(&engine, CatalogueMode::Normal, "crystal");

        // A new engine over the same store serves the result immediately.
        let reborn = MatchEngine::new(inventory, sample_catalogue(), store);
        assert_eq!(
            reborn.request_category_matches(CatalogueMode::Normal, "crystal"),
            CategoryMatches::Ready(warm)
        );
    }

    #[test]
    fn test_build_best_sets_and_reentry() {
        let engine = engine_with(sample_inventory());
        let sets = engine.build_best_sets().expect("first run");
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].head.id, 1);

        // Finished runs release the guard.
        assert!(engine.build_best_sets().is_some());

        // Simulate an in-flight run: the next call is a no-op.
        engine.sets_running.store(true, Ordering::SeqCst);
        assert!(engine.build_best_sets().is_none());
        engine.sets_running.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_empty_inventory_stays_interactive() {
        let engine = engine_with(FakeInventory::new(Vec::new()));
        let assignment = poll_ready(&engine, CatalogueMode::Normal, "crystal");
        assert!(assignment.targets.iter().all(|t| t.head.is_none()));
        assert_eq!(engine.build_best_sets(), Some(Vec::new()));
    }
}
