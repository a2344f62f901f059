//! Color space conversions and the perceptual distance metric.
//!
//! Everything here is pure and stateless (safe from any thread), except
//! [`LabCache`], which must be populated before sharing. Distance is plain
//! Euclidean ΔE in CIELAB, not CIE94/CIEDE2000: the match tolerance below
//! is calibrated against the simplified metric and must stay with it.

use palette::{white_point::D65, FromColor, Lab, Srgb, Xyz};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// CIELAB value in the D65 whitepoint used everywhere in the engine.
pub type LabColor = Lab<D65, f32>;

/// A candidate piece qualifies only within this ΔE of the target.
pub const MATCH_TOLERANCE: f32 = 5.0;

/// ΔE at or under this reads as a visually exact ("tier 1") match.
pub const TIER_ONE_TOLERANCE: f32 = 2.0;

/// Convert a 6-digit hex string (optionally `#`-prefixed) to RGB.
///
/// Malformed input degrades to sentinel black instead of failing: the
/// caller may be rendering every frame and must never crash on one bad
/// catalogue or inventory record.
pub fn hex_to_rgb(hex: &str) -> [u8; 3] {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return [0, 0, 0];
    }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    [r, g, b]
}

/// Convert RGB to an uppercase 6-digit hex string.
pub fn rgb_to_hex(rgb: [u8; 3]) -> String {
    format!("{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Convert RGB [0-255] to CIE XYZ (D65).
pub fn rgb_to_xyz(rgb: [u8; 3]) -> Xyz<D65, f32> {
    let srgb = Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    );
    Xyz::from_color(srgb)
}

/// Convert CIE XYZ (D65) to CIELAB.
pub fn xyz_to_lab(xyz: Xyz<D65, f32>) -> LabColor {
    Lab::from_color(xyz)
}

/// Convert RGB [0-255] to CIELAB.
pub fn rgb_to_lab(rgb: [u8; 3]) -> LabColor {
    let srgb = Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    );
    Lab::from_color(srgb)
}

/// Convert CIELAB back to RGB, clamping out-of-gamut channels.
pub fn lab_to_rgb_approx(lab: LabColor) -> [u8; 3] {
    let srgb = Srgb::from_color(lab);
    [
        (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

/// Convert a hex string straight to CIELAB (sentinel black on bad input).
pub fn hex_to_lab(hex: &str) -> LabColor {
    rgb_to_lab(hex_to_rgb(hex))
}

/// Simplified ΔE: Euclidean distance in L,a,b.
pub fn lab_distance(a: LabColor, b: LabColor) -> f32 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    (dl * dl + da * da + db * db).sqrt()
}

/// Round a distance to two decimals for display. Comparisons always use
/// full precision; this is presentation only.
pub fn display_distance(distance: f32) -> f32 {
    (distance * 100.0).round() / 100.0
}

/// UI-facing quality bucket for a match distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// ΔE ≤ 2: visually indistinguishable.
    Excellent,
    /// ΔE ≤ 5: close enough to pass at a glance.
    Good,
}

impl MatchTier {
    /// Bucket a distance, or `None` when it falls outside the tolerance.
    pub fn from_distance(distance: f32) -> Option<MatchTier> {
        if distance <= TIER_ONE_TOLERANCE {
            Some(MatchTier::Excellent)
        } else if distance <= MATCH_TOLERANCE {
            Some(MatchTier::Good)
        } else {
            None
        }
    }
}

/// Memoizing `hex -> Lab` table for the lifetime of one computation.
///
/// Population is not thread-safe and must finish before any fan-out; the
/// populated table is then shared read-only across workers. `get` falls
/// back to a fresh conversion on a miss rather than mutating.
#[derive(Debug, Default)]
pub struct LabCache {
    entries: HashMap<String, LabColor>,
}

impl LabCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precompute Lab values for every hex in `hexes`.
    pub fn populate<'a, I>(&mut self, hexes: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for hex in hexes {
            self.entries
                .entry(hex.to_string())
                .or_insert_with(|| hex_to_lab(hex));
        }
    }

    /// Look up a hex, converting on the fly if it was never populated.
    pub fn get(&self, hex: &str) -> LabColor {
        match self.entries.get(hex) {
            Some(lab) => *lab,
            None => hex_to_lab(hex),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
