//! Concurrent checklist computation: per-target fan-out over a bounded
//! worker pool, with a dedicated finalizer thread doing the only blocking
//! wait in the system.
//!
//! State per (mode, category): Idle -> Computing -> Finalizing -> Idle.
//! Starting an already-computing key is a silent no-op; there is no
//! cancellation, a computation always runs to completion.

use crate::cache::CacheHandle;
use crate::catalogue::{CatalogueMode, TargetColor};
use crate::checklist::{self, Candidate};
use crate::color::LabCache;
use crate::inventory::InventorySnapshot;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

type ComputeKey = (CatalogueMode, String);

/// Completion counter for one in-flight computation, polled by the UI.
pub struct ComputeProgress {
    done: AtomicUsize,
    total: usize,
}

impl ComputeProgress {
    fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (self.done.load(Ordering::Relaxed), self.total)
    }
}

struct SchedulerInner {
    in_flight: Mutex<HashMap<ComputeKey, Arc<ComputeProgress>>>,
}

impl SchedulerInner {
    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<ComputeKey, Arc<ComputeProgress>>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim a key, or `None` when it is already computing.
    fn try_begin(&self, key: &ComputeKey, total: usize) -> Option<Arc<ComputeProgress>> {
        let mut in_flight = self.locked();
        if in_flight.contains_key(key) {
            return None;
        }
        let progress = Arc::new(ComputeProgress::new(total));
        in_flight.insert(key.clone(), progress.clone());
        Some(progress)
    }

    fn finish(&self, key: &ComputeKey) {
        self.locked().remove(key);
    }
}

/// Coordinates the Computing/Finalizing cycle per (mode, category).
pub struct ComputationScheduler {
    inner: Arc<SchedulerInner>,
}

impl Default for ComputationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputationScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_computing(&self, mode: CatalogueMode, category: &str) -> bool {
        self.inner
            .locked()
            .contains_key(&(mode, category.to_string()))
    }

    /// `(done, total)` for an in-flight computation, `None` otherwise.
    pub fn progress(&self, mode: CatalogueMode, category: &str) -> Option<(usize, usize)> {
        self.inner
            .locked()
            .get(&(mode, category.to_string()))
            .map(|p| p.snapshot())
    }

    /// Dispatch a computation and return immediately.
    ///
    /// Inserts the cache placeholder, then hands everything to a detached
    /// finalizer thread. Returns `false` (and does nothing) when this key
    /// is already computing.
    pub fn start(
        &self,
        mode: CatalogueMode,
        category: &str,
        targets: Vec<TargetColor>,
        snapshot: Arc<InventorySnapshot>,
        cache: Arc<CacheHandle>,
    ) -> bool {
        let key = (mode, category.to_string());
        let Some(progress) = self.inner.try_begin(&key, targets.len()) else {
            return false;
        };

        cache.insert_placeholder(mode, category, targets.len());
        log::info!(
            "computing {} matches for '{}': {} targets against {} pieces",
            mode.label(),
            category,
            targets.len(),
            snapshot.len()
        );

        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            let started = Instant::now();

            // Populate the hex -> Lab table single-threaded, before any
            // fan-out; workers then share it read-only.
            let mut labs = LabCache::new();
            labs.populate(targets.iter().map(|t| t.hex.as_str()));

            let per_target = collect_all_targets(&targets, &snapshot, &labs, &progress);

            // Finalizing: aggregate in target-index order, assign, commit.
            let assignment = checklist::assign_category(&snapshot, per_target);
            if let Err(err) = cache.commit(key.0, &key.1, assignment, snapshot.len()) {
                log::warn!("match cache persist failed for '{}': {err}", key.1);
            }
            inner.finish(&key);
            log::info!(
                "{} matches for '{}' finished in {}ms",
                key.0.label(),
                key.1,
                started.elapsed().as_millis()
            );
        });

        true
    }
}

/// Fan candidate collection out across a bounded pool, one task per
/// target, each writing its own index-addressed result slot.
///
/// Pool creation failure degrades to an identical sequential scan.
fn collect_all_targets(
    targets: &[TargetColor],
    snapshot: &InventorySnapshot,
    labs: &LabCache,
    progress: &ComputeProgress,
) -> Vec<Vec<Candidate>> {
    let collect_one = |(index, target): (usize, &TargetColor)| {
        let candidates = checklist::collect_candidates(snapshot, target, index, labs);
        progress.done.fetch_add(1, Ordering::Relaxed);
        candidates
    };

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(targets.len())
        .max(1);

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| targets.par_iter().enumerate().map(collect_one).collect()),
        Err(err) => {
            log::warn!("worker pool unavailable, scanning sequentially: {err}");
            targets.iter().enumerate().map(collect_one).collect()
        }
    }
}
