// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debug overlay flags.

use core::fmt;
use core::ops::{BitOr, BitOrAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A set of debug overlays drawn on top of the map.
///
/// Bit values are part of the C ABI and must not change.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapDebugOptions(u32);

impl MapDebugOptions {
    /// No overlays.
    pub const NO_DEBUG: Self = Self(0);
    /// Outline every tile.
    pub const TILE_BORDERS: Self = Self(1 << 1);
    /// Show tile parse state.
    pub const PARSE_STATUS: Self = Self(1 << 2);
    /// Show tile load timestamps.
    pub const TIMESTAMPS: Self = Self(1 << 3);
    /// Show symbol collision boxes.
    pub const COLLISION: Self = Self(1 << 4);
    /// Tint overdraw.
    pub const OVERDRAW: Self = Self(1 << 5);
    /// Visualize the stencil clip buffer.
    pub const STENCIL_CLIP: Self = Self(1 << 6);
    /// Visualize the depth buffer.
    pub const DEPTH_BUFFER: Self = Self(1 << 7);

    const NAMED: [(Self, &'static str); 7] = [
        (Self::TILE_BORDERS, "TileBorders"),
        (Self::PARSE_STATUS, "ParseStatus"),
        (Self::TIMESTAMPS, "Timestamps"),
        (Self::COLLISION, "Collision"),
        (Self::OVERDRAW, "Overdraw"),
        (Self::STENCIL_CLIP, "StencilClip"),
        (Self::DEPTH_BUFFER, "DepthBuffer"),
    ];

    const ALL_BITS: u32 = 0b1111_1110;

    /// Raw bit value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a set from raw bits, dropping unknown ones.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    /// Returns `true` if no overlay is enabled.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every flag in `other` is enabled.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Enables or disables `flag`.
    pub fn set(&mut self, flag: Self, enabled: bool) {
        if enabled {
            *self |= flag;
        } else {
            *self -= flag;
        }
    }

    /// Iterates over the enabled flags in bit order.
    pub fn iter(self) -> impl Iterator<Item = Self> {
        Self::NAMED
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |flag| self.contains(*flag))
    }
}

impl BitOr for MapDebugOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MapDebugOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Sub for MapDebugOptions {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl SubAssign for MapDebugOptions {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 &= !rhs.0;
    }
}

impl fmt::Display for MapDebugOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NoDebug");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MapDebugOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapDebugOptions({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_difference() {
        let flags = MapDebugOptions::TILE_BORDERS | MapDebugOptions::COLLISION;
        assert!(flags.contains(MapDebugOptions::COLLISION), "union");
        let flags = flags - MapDebugOptions::COLLISION;
        assert_eq!(flags, MapDebugOptions::TILE_BORDERS, "difference");
        assert_eq!(flags.bits(), 2, "stable bit value");
    }

    #[test]
    fn display_lists_names() {
        assert_eq!(MapDebugOptions::NO_DEBUG.to_string(), "NoDebug", "empty");
        let flags = MapDebugOptions::OVERDRAW | MapDebugOptions::TILE_BORDERS;
        assert_eq!(flags.to_string(), "TileBorders | Overdraw", "bit order");
    }

    #[test]
    fn set_and_truncate() {
        let mut flags = MapDebugOptions::default();
        flags.set(MapDebugOptions::DEPTH_BUFFER, true);
        assert_eq!(flags.bits(), 1 << 7, "enabled");
        flags.set(MapDebugOptions::DEPTH_BUFFER, false);
        assert!(flags.is_empty(), "disabled");
        assert_eq!(
            MapDebugOptions::from_bits_truncate(0xffff_ffff).iter().count(),
            7,
            "unknown bits dropped"
        );
    }
}
