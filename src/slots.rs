//! Equipment slot types and the free-text name classifier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One of the four equipment positions a piece can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Head,
    Torso,
    Legs,
    Feet,
}

impl Slot {
    /// Canonical slot ordering, used for partitioning and display.
    pub const ALL: [Slot; 4] = [Slot::Head, Slot::Torso, Slot::Legs, Slot::Feet];

    pub fn index(self) -> usize {
        match self {
            Slot::Head => 0,
            Slot::Torso => 1,
            Slot::Legs => 2,
            Slot::Feet => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Head => "head",
            Slot::Torso => "torso",
            Slot::Legs => "legs",
            Slot::Feet => "feet",
        }
    }
}

fn slot_patterns() -> &'static [(Slot, Regex); 4] {
    static PATTERNS: OnceLock<[(Slot, Regex); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                Slot::Head,
                Regex::new(r"(?i)\b(helmet|helm|hat|cap|hood|crown|mask|beanie)\b")
                    .expect("head slot pattern"),
            ),
            (
                Slot::Torso,
                Regex::new(r"(?i)\b(chestplate|chest|tunic|shirt|jacket|robe|vest|coat|top)\b")
                    .expect("torso slot pattern"),
            ),
            (
                Slot::Legs,
                Regex::new(r"(?i)\b(leggings|pants|trousers|greaves|shorts|skirt)\b")
                    .expect("legs slot pattern"),
            ),
            (
                Slot::Feet,
                Regex::new(r"(?i)\b(boots|boot|shoes|sandals|sneakers|slippers|socks)\b")
                    .expect("feet slot pattern"),
            ),
        ]
    })
}

/// Classify a free-text piece name into a slot.
///
/// First matching slot wins, checked in [`Slot::ALL`] order; names that
/// match nothing stay unclassified and are skipped by candidate scans.
pub fn classify(name: &str) -> Option<Slot> {
    for (slot, pattern) in slot_patterns() {
        if pattern.is_match(name) {
            return Some(*slot);
        }
    }
    None
}
