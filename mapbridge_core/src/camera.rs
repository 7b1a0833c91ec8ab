// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Camera value types.
//!
//! These are plain records. The camera state itself lives in the engine and is
//! read back through [`Map::camera_options`](crate::map::Map::camera_options).

use core::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CameraError;

/// A geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Degrees north of the equator, `-90..=90`.
    pub latitude: f64,
    /// Degrees east of the prime meridian.
    pub longitude: f64,
}

impl LatLng {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both fields are finite and the latitude is in range.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
    }

    /// Returns the coordinate with longitude wrapped into `[-180, 180)`.
    #[must_use]
    pub fn wrapped(self) -> Self {
        Self {
            latitude: self.latitude,
            longitude: (self.longitude + 180.0).rem_euclid(360.0) - 180.0,
        }
    }
}

/// A point on screen in logical pixels, origin at the top left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenCoordinate {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl ScreenCoordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Converts to a `kurbo` point.
    #[must_use]
    pub const fn to_point(self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

impl From<kurbo::Point> for ScreenCoordinate {
    fn from(p: kurbo::Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<ScreenCoordinate> for kurbo::Point {
    fn from(c: ScreenCoordinate) -> Self {
        c.to_point()
    }
}

/// Insets from the viewport edges, in logical pixels.
///
/// Padding shifts the map's visual center away from the viewport center.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeInsets {
    /// Inset from the top edge.
    pub top: f64,
    /// Inset from the left edge.
    pub left: f64,
    /// Inset from the bottom edge.
    pub bottom: f64,
    /// Inset from the right edge.
    pub right: f64,
}

impl EdgeInsets {
    /// Creates insets.
    #[must_use]
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Returns `true` if every inset is zero.
    #[must_use]
    pub fn is_flush(self) -> bool {
        self.top == 0.0 && self.left == 0.0 && self.bottom == 0.0 && self.right == 0.0
    }

    /// Returns `true` if no inset is NaN or infinite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.top.is_finite()
            && self.left.is_finite()
            && self.bottom.is_finite()
            && self.right.is_finite()
    }

    /// Center of the padded area of a `width` by `height` viewport.
    #[must_use]
    pub fn center(self, width: f64, height: f64) -> ScreenCoordinate {
        ScreenCoordinate::new(
            self.left + (width - self.left - self.right) / 2.0,
            self.top + (height - self.top - self.bottom) / 2.0,
        )
    }
}

impl Add for EdgeInsets {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            top: self.top + rhs.top,
            left: self.left + rhs.left,
            bottom: self.bottom + rhs.bottom,
            right: self.right + rhs.right,
        }
    }
}

/// A full or partial camera description.
///
/// Unset fields leave the corresponding camera property unchanged when the
/// options are applied. `center` and `anchor` are mutually exclusive: the
/// center moves the map, the anchor pins a screen point while zoom and
/// bearing change around it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Geographic point at the (padded) viewport center.
    pub center: Option<LatLng>,
    /// Viewport padding.
    pub padding: Option<EdgeInsets>,
    /// Screen point kept fixed while zooming or rotating.
    pub anchor: Option<ScreenCoordinate>,
    /// Zoom level.
    pub zoom: Option<f64>,
    /// Rotation in degrees clockwise from north.
    pub bearing: Option<f64>,
    /// Tilt in degrees away from straight down.
    pub pitch: Option<f64>,
}

impl CameraOptions {
    /// A camera that centers `center` at `zoom`.
    #[must_use]
    pub fn centered(center: LatLng, zoom: f64) -> Self {
        Self {
            center: Some(center),
            zoom: Some(zoom),
            ..Self::default()
        }
    }

    /// A camera that zooms to `zoom` around the screen point `anchor`.
    #[must_use]
    pub fn anchored(anchor: ScreenCoordinate, zoom: f64) -> Self {
        Self {
            anchor: Some(anchor),
            zoom: Some(zoom),
            ..Self::default()
        }
    }

    /// Sets the center.
    #[must_use]
    pub fn with_center(mut self, center: LatLng) -> Self {
        self.center = Some(center);
        self
    }

    /// Sets the padding.
    #[must_use]
    pub fn with_padding(mut self, padding: EdgeInsets) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Sets the anchor.
    #[must_use]
    pub fn with_anchor(mut self, anchor: ScreenCoordinate) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Sets the zoom.
    #[must_use]
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    /// Sets the bearing.
    #[must_use]
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Sets the pitch.
    #[must_use]
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks that the options can be applied.
    ///
    /// # Errors
    ///
    /// - [`CameraError::CenterAndAnchor`] if both are set.
    /// - [`CameraError::NotFinite`] for NaN or infinite numbers, or a latitude
    ///   outside `-90..=90`.
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.center.is_some() && self.anchor.is_some() {
            return Err(CameraError::CenterAndAnchor);
        }
        if self.center.is_some_and(|c| !c.is_valid()) {
            return Err(CameraError::NotFinite("center"));
        }
        if self.padding.is_some_and(|p| !p.is_finite()) {
            return Err(CameraError::NotFinite("padding"));
        }
        if self.anchor.is_some_and(|a| !a.x.is_finite() || !a.y.is_finite()) {
            return Err(CameraError::NotFinite("anchor"));
        }
        for (name, value) in [
            ("zoom", self.zoom),
            ("bearing", self.bearing),
            ("pitch", self.pitch),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(CameraError::NotFinite(name));
            }
        }
        Ok(())
    }

    /// Overlays the fields set in `update` onto `self`.
    #[must_use]
    pub fn merged(self, update: &Self) -> Self {
        Self {
            center: update.center.or(self.center),
            padding: update.padding.or(self.padding),
            anchor: update.anchor.or(self.anchor),
            zoom: update.zoom.or(self.zoom),
            bearing: update.bearing.or(self.bearing),
            pitch: update.pitch.or(self.pitch),
        }
    }
}

/// Timing of an animated camera transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationOptions {
    /// Total duration. Zero applies the camera immediately.
    pub duration: Duration,
}

impl AnimationOptions {
    /// Default duration of [`Map::ease_to`](crate::map::Map::ease_to).
    pub const EASE_DEFAULT: Self = Self::from_millis(300);
    /// Default duration of [`Map::fly_to`](crate::map::Map::fly_to).
    pub const FLY_DEFAULT: Self = Self::from_millis(1000);

    /// Creates options lasting `ms` milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self {
            duration: Duration::from_millis(ms),
        }
    }
}
