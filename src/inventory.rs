//! Inventory records and the immutable snapshot taken per computation.
//!
//! The live inventory is owned by a collaborator and may mutate at any
//! time; the engine only ever works against an [`InventorySnapshot`], a
//! fully materialized copy (every Lab value precomputed) that is safe to
//! share read-only across worker threads.

use crate::color::{self, LabColor};
use crate::slots::{self, Slot};
use palette::Lab;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw inventory record as handed over by the inventory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPiece {
    pub id: u64,
    pub display_name: String,
    pub hex: String,
}

impl RawPiece {
    pub fn new(id: u64, display_name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            hex: hex.into(),
        }
    }
}

/// Contract for the live inventory collaborator.
///
/// `snapshot` must yield a stable iteration order with no live mutation
/// visible mid-snapshot; `size` is polled every frame and should be cheap.
pub trait InventorySource: Send + Sync {
    fn snapshot(&self) -> Vec<RawPiece>;
    fn size(&self) -> usize;
}

/// A colored inventory piece with its detected slot and derived Lab value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub id: u64,
    pub display_name: String,
    pub hex: String,
    /// `None` when the name matched no slot heuristic; such pieces are
    /// never candidates.
    pub slot: Option<Slot>,
    pub lab: [f32; 3],
}

impl Piece {
    pub fn lab_color(&self) -> LabColor {
        Lab::new(self.lab[0], self.lab[1], self.lab[2])
    }
}

/// Immutable, thread-safe copy of the inventory at computation start.
#[derive(Debug, Clone)]
pub struct InventorySnapshot {
    pieces: Vec<Piece>,
    labs: Vec<LabColor>,
    by_id: HashMap<u64, usize>,
}

impl InventorySnapshot {
    /// Snapshot the live inventory, classifying slots and precomputing
    /// every Lab value up front. Malformed hex degrades to sentinel black
    /// and unknown names stay unclassified; no record is ever rejected.
    pub fn capture(source: &dyn InventorySource) -> Self {
        Self::from_raw(source.snapshot())
    }

    pub fn from_raw(raw: Vec<RawPiece>) -> Self {
        let mut pieces = Vec::with_capacity(raw.len());
        let mut labs = Vec::with_capacity(raw.len());
        let mut by_id = HashMap::with_capacity(raw.len());

        for record in raw {
            let lab = color::hex_to_lab(&record.hex);
            let slot = slots::classify(&record.display_name);
            by_id.insert(record.id, pieces.len());
            labs.push(lab);
            pieces.push(Piece {
                id: record.id,
                display_name: record.display_name,
                hex: record.hex,
                slot,
                lab: [lab.l, lab.a, lab.b],
            });
        }

        Self {
            pieces,
            labs,
            by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn lab(&self, index: usize) -> LabColor {
        self.labs[index]
    }

    pub fn piece_by_id(&self, id: u64) -> Option<&Piece> {
        self.by_id.get(&id).map(|&i| &self.pieces[i])
    }

    /// Indices of all pieces detected in `slot`, preserving snapshot order.
    pub fn slot_indices(&self, slot: Slot) -> Vec<usize> {
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| p.slot == Some(slot))
            .map(|(i, _)| i)
            .collect()
    }
}
