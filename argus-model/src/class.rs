//! Detectable object categories and their display metadata.

use serde::{Deserialize, Serialize};

/// Display color for a class, stored as 0–255 RGB channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A detectable category from the `object_class` table.
///
/// Classes come in pairs: a "positive" class (`helmet`) and its violation
/// counterpart (`no-helmet`), linked symmetrically through `pair_id`. Only
/// classes with `is_violation == true` may produce violation records; their
/// counterparts exist for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectClass {
    pub id: i32,
    pub name: String,
    pub color: Rgb,
    pub is_violation: bool,
    pub pair_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_color_defaults_to_white() {
        assert_eq!(Rgb::default(), Rgb::WHITE);
    }
}
