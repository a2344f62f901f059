//! Checklist matching: per-target candidate generation and the greedy
//! one-to-one assignment that turns candidates into a category checklist.
//!
//! Assignment is a deliberate greedy approximation of bipartite matching
//! (sort by distance, claim if unclaimed): it favors obviously-best
//! matches early and is O(n log n) per slot. This is user-visible product
//! behavior; swapping in an optimal matcher would change results.

use crate::catalogue::TargetColor;
use crate::color::{self, LabCache, MATCH_TOLERANCE};
use crate::inventory::InventorySnapshot;
use crate::slots::Slot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// A piece within tolerance of one target in one slot. Ephemeral: produced
/// by the candidate scan, consumed by assignment, then discarded.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub target_hex: String,
    pub target_index: usize,
    pub piece_id: u64,
    pub slot: Slot,
    pub distance: f32,
}

/// The committed match for one (target, slot) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMatch {
    pub piece_id: u64,
    pub display_name: String,
    pub hex: String,
    pub distance: f32,
}

/// Matches for one target across all four slots. A `None` slot renders as
/// "missing", never as an error; `complete` flips when the finalizer has
/// committed this target's assignments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMatches {
    pub head: Option<SlotMatch>,
    pub torso: Option<SlotMatch>,
    pub legs: Option<SlotMatch>,
    pub feet: Option<SlotMatch>,
    pub complete: bool,
}

impl TargetMatches {
    pub fn slot(&self, slot: Slot) -> &Option<SlotMatch> {
        match slot {
            Slot::Head => &self.head,
            Slot::Torso => &self.torso,
            Slot::Legs => &self.legs,
            Slot::Feet => &self.feet,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<SlotMatch> {
        match slot {
            Slot::Head => &mut self.head,
            Slot::Torso => &mut self.torso,
            Slot::Legs => &mut self.legs,
            Slot::Feet => &mut self.feet,
        }
    }
}

/// Assignment result for one category, keyed by target index (hexes can
/// repeat across fade stages, so the index is the identity).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssignment {
    pub targets: Vec<TargetMatches>,
}

impl CategoryAssignment {
    /// Placeholder inserted the instant a computation starts, so the UI
    /// can render pending rows while workers run.
    pub fn placeholder(target_count: usize) -> Self {
        Self {
            targets: vec![TargetMatches::default(); target_count],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.targets.iter().all(|t| t.complete)
    }
}

/// Scan the snapshot for every piece within tolerance of `target`, one
/// candidate list entry per qualifying (piece, applicable slot) pair.
///
/// Pure with respect to the snapshot: each worker calls this for its own
/// target index and stores into its own result slot, so no two tasks
/// share mutable state during the fan-out.
pub fn collect_candidates(
    snapshot: &InventorySnapshot,
    target: &TargetColor,
    target_index: usize,
    labs: &LabCache,
) -> Vec<Candidate> {
    let target_lab = labs.get(&target.hex);
    let mut candidates = Vec::new();

    for (index, piece) in snapshot.pieces().iter().enumerate() {
        let Some(slot) = piece.slot else {
            continue;
        };
        if !target.applies_to(slot) {
            continue;
        }
        let distance = color::lab_distance(target_lab, snapshot.lab(index));
        if distance <= MATCH_TOLERANCE {
            candidates.push(Candidate {
                target_hex: target.hex.clone(),
                target_index,
                piece_id: piece.id,
                slot,
                distance,
            });
        }
    }

    candidates
}

/// Greedy one-to-one assignment across one category.
///
/// `per_target` must be in target-index order (index-addressed fan-out
/// slots give this for free); aggregation order is the tie-break for equal
/// distances, keeping one run's output deterministic for fixed inputs.
pub fn assign_category(
    snapshot: &InventorySnapshot,
    per_target: Vec<Vec<Candidate>>,
) -> CategoryAssignment {
    let mut assignment = CategoryAssignment::placeholder(per_target.len());

    // Partition by slot only; targets compete within a slot.
    let mut by_slot: [Vec<Candidate>; 4] = std::array::from_fn(|_| Vec::new());
    for candidates in per_target {
        for candidate in candidates {
            by_slot[candidate.slot.index()].push(candidate);
        }
    }

    for slot_candidates in &mut by_slot {
        // Stable sort: equal distances keep aggregation order.
        slot_candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });

        let mut claimed_pieces: HashSet<u64> = HashSet::new();
        let mut claimed_targets: HashSet<usize> = HashSet::new();

        for candidate in slot_candidates.drain(..) {
            if claimed_pieces.contains(&candidate.piece_id)
                || claimed_targets.contains(&candidate.target_index)
            {
                continue;
            }
            let Some(piece) = snapshot.piece_by_id(candidate.piece_id) else {
                continue;
            };
            claimed_pieces.insert(candidate.piece_id);
            claimed_targets.insert(candidate.target_index);
            *assignment.targets[candidate.target_index].slot_mut(candidate.slot) =
                Some(SlotMatch {
                    piece_id: candidate.piece_id,
                    display_name: piece.display_name.clone(),
                    hex: piece.hex.clone(),
                    distance: candidate.distance,
                });
        }
    }

    for target in &mut assignment.targets {
        target.complete = true;
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::RawPiece;
    use crate::slots::Slot;

    fn snapshot_of(raw: Vec<RawPiece>) -> InventorySnapshot {
        InventorySnapshot::from_raw(raw)
    }

    fn head_target(hex: &str) -> TargetColor {
        TargetColor::new(hex, hex.to_string(), vec![Slot::Head])
    }

    fn labs_for(targets: &[TargetColor]) -> LabCache {
        let mut labs = LabCache::new();
        labs.populate(targets.iter().map(|t| t.hex.as_str()));
        labs
    }

    fn run(snapshot: &InventorySnapshot, targets: &[TargetColor]) -> CategoryAssignment {
        let labs = labs_for(targets);
        let per_target = targets
            .iter()
            .enumerate()
            .map(|(i, t)| collect_candidates(snapshot, t, i, &labs))
            .collect();
        assign_category(snapshot, per_target)
    }

    #[test]
    fn test_close_piece_matches_within_tier_one() {
        let snapshot = snapshot_of(vec![RawPiece::new(1, "Ruby Helmet", "FF0000")]);
        let assignment = run(&snapshot, &[head_target("FE0101")]);

        let slot_match = assignment.targets[0].head.as_ref().expect("match");
        assert_eq!(slot_match.piece_id, 1);
        assert!(slot_match.distance < 1.0);
        assert!(assignment.is_complete());
    }

    #[test]
    fn test_distant_piece_yields_missing() {
        let snapshot = snapshot_of(vec![RawPiece::new(1, "Ruby Helmet", "FF0000")]);
        let assignment = run(&snapshot, &[head_target("00FF00")]);
        assert!(assignment.targets[0].head.is_none());
        assert!(assignment.targets[0].complete);
    }

    #[test]
    fn test_tolerance_gate_on_candidates() {
        let snapshot = snapshot_of(vec![
            RawPiece::new(1, "Ruby Helmet", "FF0000"),
            RawPiece::new(2, "Grass Helmet", "00FF00"),
        ]);
        let target = head_target("FE0101");
        let labs = labs_for(std::slice::from_ref(&target));
        let candidates = collect_candidates(&snapshot, &target, 0, &labs);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].distance <= MATCH_TOLERANCE);
    }

    #[test]
    fn test_exclusive_assignment_within_slot() {
        // Two identical targets, one piece: exactly one target gets it.
        let snapshot = snapshot_of(vec![RawPiece::new(1, "Ruby Helmet", "FF0000")]);
        let targets = [head_target("FF0000"), head_target("FF0000")];
        let assignment = run(&snapshot, &targets);

        let matched: Vec<_> = assignment
            .targets
            .iter()
            .filter(|t| t.head.is_some())
            .collect();
        assert_eq!(matched.len(), 1);
        // Aggregation order breaks the tie: target 0 wins.
        assert!(assignment.targets[0].head.is_some());
        assert!(assignment.targets[1].head.is_none());
    }

    #[test]
    fn test_greedy_prefers_closest_pairing() {
        // Piece 2 is an exact match for target 1; piece 1 is close to both.
        let snapshot = snapshot_of(vec![
            RawPiece::new(1, "Worn Helmet", "FA0303"),
            RawPiece::new(2, "Fresh Helmet", "FF0000"),
        ]);
        let targets = [head_target("FF0000"), head_target("FB0202")];
        let assignment = run(&snapshot, &targets);

        assert_eq!(
            assignment.targets[0].head.as_ref().map(|m| m.piece_id),
            Some(2)
        );
        assert_eq!(
            assignment.targets[1].head.as_ref().map(|m| m.piece_id),
            Some(1)
        );
    }

    #[test]
    fn test_no_piece_claimed_twice_across_slots_lists() {
        // A torso piece must not satisfy a head-only target.
        let snapshot = snapshot_of(vec![RawPiece::new(1, "Ruby Chestplate", "FF0000")]);
        let assignment = run(&snapshot, &[head_target("FF0000")]);
        assert!(assignment.targets[0].head.is_none());
    }

    #[test]
    fn test_committed_distances_respect_tolerance() {
        let snapshot = snapshot_of(vec![
            RawPiece::new(1, "Helmet A", "FF0000"),
            RawPiece::new(2, "Helmet B", "FD0404"),
            RawPiece::new(3, "Helmet C", "00FF00"),
        ]);
        let targets = [head_target("FF0000"), head_target("FE0202")];
        let assignment = run(&snapshot, &targets);

        let mut seen = HashSet::new();
        for target in &assignment.targets {
            if let Some(m) = &target.head {
                assert!(m.distance <= MATCH_TOLERANCE);
                assert!(seen.insert(m.piece_id), "piece assigned twice");
            }
        }
    }

    #[test]
    fn test_placeholder_is_incomplete() {
        let placeholder = CategoryAssignment::placeholder(3);
        assert_eq!(placeholder.targets.len(), 3);
        assert!(!placeholder.is_complete());
        assert!(CategoryAssignment::placeholder(0).is_complete());
    }
}
