//! Static target-color catalogue types.
//!
//! The catalogue data itself is owned by a collaborator and fixed for the
//! process lifetime; the engine only reads it. Normal palettes and fade
//! gradients are disjoint catalogues computed and cached independently,
//! since a piece can be the unique best match in one mode and unused in
//! the other.

use crate::slots::Slot;
use serde::{Deserialize, Serialize};

/// Which of the two disjoint catalogues a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogueMode {
    Normal,
    Fade,
}

impl CatalogueMode {
    pub const ALL: [CatalogueMode; 2] = [CatalogueMode::Normal, CatalogueMode::Fade];

    pub fn label(self) -> &'static str {
        match self {
            CatalogueMode::Normal => "normal",
            CatalogueMode::Fade => "fade",
        }
    }
}

/// One target color within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetColor {
    pub hex: String,
    pub display_name: String,
    pub applicable_slots: Vec<Slot>,
}

impl TargetColor {
    pub fn new(
        hex: impl Into<String>,
        display_name: impl Into<String>,
        applicable_slots: Vec<Slot>,
    ) -> Self {
        Self {
            hex: hex.into(),
            display_name: display_name.into(),
            applicable_slots,
        }
    }

    pub fn applies_to(&self, slot: Slot) -> bool {
        self.applicable_slots.contains(&slot)
    }
}

/// Named ordered list of target colors. For fade categories the order is
/// the gradient stage order and hexes may repeat across stages, which is
/// why assignments are keyed by target index rather than hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub targets: Vec<TargetColor>,
}

impl Category {
    pub fn new(name: impl Into<String>, targets: Vec<TargetColor>) -> Self {
        Self {
            name: name.into(),
            targets,
        }
    }
}

/// The full two-mode catalogue, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    normal: Vec<Category>,
    fade: Vec<Category>,
}

impl Catalogue {
    pub fn new(normal: Vec<Category>, fade: Vec<Category>) -> Self {
        Self { normal, fade }
    }

    pub fn categories(&self, mode: CatalogueMode) -> &[Category] {
        match mode {
            CatalogueMode::Normal => &self.normal,
            CatalogueMode::Fade => &self.fade,
        }
    }

    pub fn category(&self, mode: CatalogueMode, name: &str) -> Option<&Category> {
        self.categories(mode).iter().find(|c| c.name == name)
    }
}
