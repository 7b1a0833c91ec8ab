// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graphics API selection.

use core::fmt;

use mapbridge_core::error::SurfaceError;
use mapbridge_core::surface::SurfaceKind;

/// Which family of wgpu backends draws the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    /// The platform's primary API: Vulkan, Metal or DX12.
    Native,
    /// OpenGL ES through EGL, or through ANGLE with the `angle` feature.
    Gles,
}

impl Default for GraphicsApi {
    /// [`Gles`](Self::Gles) with the `gles` feature, otherwise
    /// [`Native`](Self::Native).
    fn default() -> Self {
        if cfg!(feature = "gles") {
            Self::Gles
        } else {
            Self::Native
        }
    }
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Gles => "gles",
        })
    }
}

impl GraphicsApi {
    /// The wgpu backends an instance for this API may use.
    #[must_use]
    pub fn backends(self) -> wgpu::Backends {
        match self {
            Self::Native => wgpu::Backends::PRIMARY,
            Self::Gles => wgpu::Backends::GL,
        }
    }

    /// Whether this API can draw into windows of `kind`.
    #[must_use]
    pub fn supports(self, kind: SurfaceKind) -> bool {
        match (self, kind) {
            (_, SurfaceKind::Offscreen) => false,
            (Self::Native, _) => true,
            (
                Self::Gles,
                SurfaceKind::Xlib
                | SurfaceKind::Xcb
                | SurfaceKind::Wayland
                | SurfaceKind::AndroidNdk
                | SurfaceKind::Win32,
            ) => true,
            (Self::Gles, SurfaceKind::AppKit) => cfg!(feature = "angle"),
            (Self::Gles, _) => false,
        }
    }

    /// Fails unless this API [`supports`](Self::supports) `kind`.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::Unsupported`] naming the API and window system.
    pub fn check(self, kind: SurfaceKind) -> Result<(), SurfaceError> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(SurfaceError::Unsupported(format!("{self} cannot drive {kind:?} windows")))
        }
    }
}
