// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawable surface description shared by all backends.

use core::fmt;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

/// A size in physical (device) pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PhysicalSize {
    /// Creates a size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Converts a logical size to physical pixels, rounding to the nearest
    /// pixel.
    #[must_use]
    pub fn from_logical(width: f64, height: f64, pixel_ratio: f32) -> Self {
        let ratio = f64::from(pixel_ratio);
        Self {
            width: to_pixels(width * ratio),
            height: to_pixels(height * ratio),
        }
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Converts to logical units.
    #[must_use]
    pub fn to_logical(self, pixel_ratio: f32) -> kurbo::Size {
        let ratio = f64::from(pixel_ratio);
        kurbo::Size::new(
            f64::from(self.width) / ratio,
            f64::from(self.height) / ratio,
        )
    }
}

impl fmt::Display for PhysicalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn to_pixels(v: f64) -> u32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is rounded and clamped to the u32 range"
    )]
    let px = v.round().clamp(0.0, f64::from(u32::MAX)) as u32;
    px
}

/// The window system a surface draws into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SurfaceKind {
    /// An `NSView` on macOS.
    AppKit,
    /// A `UIView` on iOS.
    UiKit,
    /// A Win32 `HWND`.
    Win32,
    /// An Xlib window.
    Xlib,
    /// An XCB window.
    Xcb,
    /// A Wayland `wl_surface`.
    Wayland,
    /// An Android `ANativeWindow`.
    AndroidNdk,
    /// No window; pixels stay in memory.
    Offscreen,
}

impl SurfaceKind {
    /// Classifies a raw window handle.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::Unsupported`] for window systems no backend drives.
    pub fn classify(raw: &RawWindowHandle) -> Result<Self, SurfaceError> {
        Ok(match raw {
            RawWindowHandle::AppKit(_) => Self::AppKit,
            RawWindowHandle::UiKit(_) => Self::UiKit,
            RawWindowHandle::Win32(_) => Self::Win32,
            RawWindowHandle::Xlib(_) => Self::Xlib,
            RawWindowHandle::Xcb(_) => Self::Xcb,
            RawWindowHandle::Wayland(_) => Self::Wayland,
            RawWindowHandle::AndroidNdk(_) => Self::AndroidNdk,
            other => return Err(SurfaceError::Unsupported(format!("{other:?}"))),
        })
    }
}

/// Where a backend draws, how large it is and at what density.
///
/// Owned by the backend that created it. Resizing through
/// [`resize`](Self::resize) is idempotent: only a change of size counts as a
/// reconfiguration.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDescriptor {
    kind: SurfaceKind,
    size: PhysicalSize,
    pixel_ratio: f32,
    reconfigurations: u64,
}

impl SurfaceDescriptor {
    /// Describes a surface of the given kind.
    ///
    /// # Errors
    ///
    /// - [`SurfaceError::NotRealized`] if either dimension is zero.
    /// - [`SurfaceError::InvalidPixelRatio`] unless the ratio is finite and
    ///   positive.
    pub fn new(
        kind: SurfaceKind,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self, SurfaceError> {
        check_realized(PhysicalSize::new(width, height))?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(SurfaceError::InvalidPixelRatio(pixel_ratio));
        }
        Ok(Self {
            kind,
            size: PhysicalSize::new(width, height),
            pixel_ratio,
            reconfigurations: 0,
        })
    }

    /// Describes the surface behind a host window.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`SurfaceError::Unsupported`] when the
    /// window handle is unavailable or of an unknown kind.
    pub fn from_window(
        window: &impl HasWindowHandle,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self, SurfaceError> {
        let handle = window
            .window_handle()
            .map_err(|e| SurfaceError::Unsupported(e.to_string()))?;
        let kind = SurfaceKind::classify(&handle.as_raw())?;
        Self::new(kind, width, height, pixel_ratio)
    }

    /// Describes an in-memory surface.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn offscreen(width: u32, height: u32, pixel_ratio: f32) -> Result<Self, SurfaceError> {
        Self::new(SurfaceKind::Offscreen, width, height, pixel_ratio)
    }

    /// The window system.
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Current size in physical pixels.
    #[must_use]
    pub fn size(&self) -> PhysicalSize {
        self.size
    }

    /// Device pixel ratio.
    #[must_use]
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Current size in logical units.
    #[must_use]
    pub fn logical_size(&self) -> kurbo::Size {
        self.size.to_logical(self.pixel_ratio)
    }

    /// Number of size changes applied since creation.
    #[must_use]
    pub fn reconfigurations(&self) -> u64 {
        self.reconfigurations
    }

    /// Records a new size. Returns `true` if the size changed.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::NotRealized`] if either dimension is zero; the stored
    /// size is left untouched.
    pub fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
        check_realized(size)?;
        if size == self.size {
            return Ok(false);
        }
        self.size = size;
        self.reconfigurations += 1;
        Ok(true)
    }
}

fn check_realized(size: PhysicalSize) -> Result<(), SurfaceError> {
    if size.is_empty() {
        return Err(SurfaceError::NotRealized {
            width: size.width,
            height: size.height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_is_not_realized() {
        assert_eq!(
            SurfaceDescriptor::offscreen(0, 300, 1.0),
            Err(SurfaceError::NotRealized {
                width: 0,
                height: 300
            }),
            "zero width rejected"
        );
        assert!(
            SurfaceDescriptor::offscreen(400, 0, 1.0).is_err(),
            "zero height rejected"
        );
    }

    #[test]
    fn bad_pixel_ratio_is_rejected() {
        assert!(
            SurfaceDescriptor::offscreen(4, 4, 0.0).is_err(),
            "zero ratio rejected"
        );
        assert!(
            SurfaceDescriptor::offscreen(4, 4, f32::NAN).is_err(),
            "NaN ratio rejected"
        );
    }

    #[test]
    fn resize_is_idempotent() {
        let mut surface = SurfaceDescriptor::offscreen(400, 300, 2.0).unwrap();
        assert_eq!(
            surface.resize(PhysicalSize::new(800, 600)),
            Ok(true),
            "first resize applies"
        );
        assert_eq!(
            surface.resize(PhysicalSize::new(800, 600)),
            Ok(false),
            "same size again"
        );
        assert_eq!(surface.reconfigurations(), 1, "one real change");
        assert!(
            surface.resize(PhysicalSize::new(0, 600)).is_err(),
            "zero size rejected"
        );
        assert_eq!(
            surface.size(),
            PhysicalSize::new(800, 600),
            "failed resize keeps size"
        );
    }

    #[test]
    fn logical_physical_conversion() {
        let physical = PhysicalSize::from_logical(400.0, 300.0, 2.0);
        assert_eq!(physical, PhysicalSize::new(800, 600), "scaled by ratio");
        let logical = physical.to_logical(2.0);
        assert!(
            (logical.width - 400.0).abs() < f64::EPSILON,
            "width round-trips"
        );
        assert_eq!(physical.to_string(), "800x600", "display format");
    }
}
