//! Best-set matching: mutually compatible 4-piece combinations.
//!
//! A nearest-neighbor chaining heuristic, not an optimal 4-partite
//! matching: heads are taken first-come-first-served and each later slot
//! picks the piece minimizing its average distance to the pieces already
//! chosen. Sensitivity to head iteration order is accepted behavior.

use crate::color::{self, LabColor, MATCH_TOLERANCE};
use crate::inventory::{InventorySnapshot, Piece};
use crate::slots::Slot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Hard cap on committed sets per run.
pub const MAX_SETS: usize = 100;

/// One committed 4-piece combination with its quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSet {
    pub head: Piece,
    pub torso: Piece,
    pub legs: Piece,
    pub feet: Piece,
    /// Mean of all six pairwise distances.
    pub average_distance: f32,
    /// Mean of the three pairwise distances left after dropping the worst
    /// piece (largest average distance to the other three).
    pub average_excluding_worst: f32,
    /// The single distance between the best two pieces after also dropping
    /// the second-worst.
    pub average_excluding_worst_two: f32,
    pub worst_slot: Slot,
}

/// Build up to [`MAX_SETS`] disjoint 4-piece sets from the snapshot.
///
/// Pieces are globally exclusive: once committed to a set, a piece never
/// appears in a later one. The returned list is sorted ascending by
/// `average_distance`.
pub fn build_best_sets(snapshot: &InventorySnapshot) -> Vec<BestSet> {
    let heads = snapshot.slot_indices(Slot::Head);
    let torsos = snapshot.slot_indices(Slot::Torso);
    let legs = snapshot.slot_indices(Slot::Legs);
    let feet = snapshot.slot_indices(Slot::Feet);

    let mut used: HashSet<u64> = HashSet::new();
    let mut sets = Vec::new();

    for &head in &heads {
        if sets.len() >= MAX_SETS {
            break;
        }
        let head_id = snapshot.pieces()[head].id;
        if used.contains(&head_id) {
            continue;
        }
        let head_lab = snapshot.lab(head);

        // Torso: closest to the head.
        let Some(torso) = pick_piece(snapshot, &torsos, &used, &[head_lab]) else {
            continue;
        };
        let torso_lab = snapshot.lab(torso);

        // Legs: smallest average distance to head and torso, both gated.
        let Some(leg) = pick_piece(snapshot, &legs, &used, &[head_lab, torso_lab]) else {
            continue;
        };
        let leg_lab = snapshot.lab(leg);

        // Feet: smallest average distance to all three, each pair gated.
        let Some(foot) = pick_piece(snapshot, &feet, &used, &[head_lab, torso_lab, leg_lab]) else {
            continue;
        };

        let members = [head, torso, leg, foot];
        let diagnostics = SetDiagnostics::compute(snapshot, members);
        if diagnostics.average_distance > MATCH_TOLERANCE {
            // Over the overall gate: discard without consuming the pieces.
            continue;
        }

        for &index in &members {
            used.insert(snapshot.pieces()[index].id);
        }
        sets.push(diagnostics.into_set(snapshot, members));
    }

    sets.sort_by(|a, b| {
        a.average_distance
            .partial_cmp(&b.average_distance)
            .unwrap_or(Ordering::Equal)
    });
    sets
}

/// Pick the unused piece minimizing its average distance to `chosen`,
/// requiring every individual pairwise distance to pass the tolerance.
fn pick_piece(
    snapshot: &InventorySnapshot,
    indices: &[usize],
    used: &HashSet<u64>,
    chosen: &[LabColor],
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    'pieces: for &index in indices {
        if used.contains(&snapshot.pieces()[index].id) {
            continue;
        }
        let lab = snapshot.lab(index);
        let mut total = 0.0;
        for &other in chosen {
            let distance = color::lab_distance(lab, other);
            if distance > MATCH_TOLERANCE {
                continue 'pieces;
            }
            total += distance;
        }
        let average = total / chosen.len() as f32;
        match best {
            Some((_, best_average)) if average >= best_average => {}
            _ => best = Some((index, average)),
        }
    }

    best.map(|(index, _)| index)
}

struct SetDiagnostics {
    average_distance: f32,
    average_excluding_worst: f32,
    average_excluding_worst_two: f32,
    worst_slot: Slot,
}

impl SetDiagnostics {
    /// `members` is in [`Slot::ALL`] order: head, torso, legs, feet.
    fn compute(snapshot: &InventorySnapshot, members: [usize; 4]) -> Self {
        let labs: Vec<LabColor> = members.iter().map(|&i| snapshot.lab(i)).collect();

        let mut pairwise = [[0.0f32; 4]; 4];
        let mut total = 0.0;
        for i in 0..4 {
            for j in (i + 1)..4 {
                let d = color::lab_distance(labs[i], labs[j]);
                pairwise[i][j] = d;
                pairwise[j][i] = d;
                total += d;
            }
        }
        let average_distance = total / 6.0;

        // Rank pieces by their average distance to the other three,
        // worst first; slot order breaks exact ties.
        let spread = |i: usize| (pairwise[i][0] + pairwise[i][1] + pairwise[i][2] + pairwise[i][3]) / 3.0;
        let mut ranked = [0usize, 1, 2, 3];
        ranked.sort_by(|&a, &b| spread(b).partial_cmp(&spread(a)).unwrap_or(Ordering::Equal));

        let remaining = [ranked[1], ranked[2], ranked[3]];
        let average_excluding_worst = (pairwise[remaining[0]][remaining[1]]
            + pairwise[remaining[0]][remaining[2]]
            + pairwise[remaining[1]][remaining[2]])
            / 3.0;
        let average_excluding_worst_two = pairwise[ranked[2]][ranked[3]];

        Self {
            average_distance,
            average_excluding_worst,
            average_excluding_worst_two,
            worst_slot: Slot::ALL[ranked[0]],
        }
    }

    fn into_set(self, snapshot: &InventorySnapshot, members: [usize; 4]) -> BestSet {
        BestSet {
            head: snapshot.pieces()[members[0]].clone(),
            torso: snapshot.pieces()[members[1]].clone(),
            legs: snapshot.pieces()[members[2]].clone(),
            feet: snapshot.pieces()[members[3]].clone(),
            average_distance: self.average_distance,
            average_excluding_worst: self.average_excluding_worst,
            average_excluding_worst_two: self.average_excluding_worst_two,
            worst_slot: self.worst_slot,
        }
    }
}
