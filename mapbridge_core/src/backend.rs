// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for platform graphics surfaces.
//!
//! Mapbridge splits platform-specific drawing work into *backend* crates.
//! Each backend turns a host window into something the native renderer can
//! draw into, and implements [`RendererBackend`] so the
//! [`RendererFrontend`](crate::frontend::RendererFrontend) can drive any of
//! them identically:
//!
//! - **Construction** takes a window handle (via `raw-window-handle`), a width,
//!   a height and a pixel ratio. A window with zero area is rejected with
//!   [`SurfaceError::NotRealized`]; hosts must defer creation until the window
//!   reports real dimensions.
//!
//! - **Frame bracket**: [`activate`](RendererBackend::activate) makes the
//!   context current and acquires a drawable,
//!   [`deactivate`](RendererBackend::deactivate) releases it.
//!
//! - **Presentation**: [`swap`](RendererBackend::swap) presents the finished
//!   frame. Backends whose surface presents on its own (a `CAMetalLayer` the
//!   window server composites) document `swap` as a no-op and return `true`
//!   from [`presents_implicitly`](RendererBackend::presents_implicitly).
//!
//! - **Resize** is idempotent: a repeated identical size does nothing and
//!   allocates nothing.
//!
//! # Crate boundaries
//!
//! `mapbridge_core` owns this contract. `mapbridge_backend_wgpu` provides the
//! platform-native and EGL/ANGLE variants, `mapbridge_backend_apple` the Metal
//! layer variant, and `mapbridge_harness` an offscreen variant for tests.
//! Application code picks one at build time and hands it to the frontend.

use core::any::Any;

use crate::error::SurfaceError;
use crate::surface::{PhysicalSize, SurfaceDescriptor};

/// A drawable surface plus the graphics context bound to it.
///
/// All variants expose the same size and pixel-ratio semantics, so the
/// frontend never needs to know which one it holds. Implementations are used
/// from a single thread and must be serialized by the caller; rendering and
/// resizing the same backend concurrently is not supported.
///
/// # Frame pseudocode
///
/// ```rust,ignore
/// backend.activate()?;
/// renderer.render(&mut backend, &params)?;
/// if !backend.presents_implicitly() {
///     backend.swap()?;
/// }
/// backend.deactivate();
/// ```
pub trait RendererBackend: Any {
    /// Describes the surface this backend draws into.
    fn surface(&self) -> &SurfaceDescriptor;

    /// Current size in physical pixels.
    fn size(&self) -> PhysicalSize {
        self.surface().size()
    }

    /// Device pixel ratio.
    fn pixel_ratio(&self) -> f32 {
        self.surface().pixel_ratio()
    }

    /// Resizes the underlying surface.
    ///
    /// Returns `Ok(false)` without touching the surface when the size is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::NotRealized`] for zero dimensions, or a variant-specific
    /// error if reconfiguration fails.
    fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError>;

    /// Prepares the context for drawing a frame.
    ///
    /// # Errors
    ///
    /// A variant-specific error if no drawable can be acquired.
    fn activate(&mut self) -> Result<(), SurfaceError>;

    /// Ends the frame started by [`activate`](Self::activate).
    fn deactivate(&mut self);

    /// Presents the completed frame.
    ///
    /// # Errors
    ///
    /// A variant-specific error if presentation fails.
    fn swap(&mut self) -> Result<(), SurfaceError>;

    /// Returns `true` if frames reach the screen without [`swap`](Self::swap).
    fn presents_implicitly(&self) -> bool {
        false
    }

    /// Upcast used by renderers that need the concrete backend.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl RendererBackend for Box<dyn RendererBackend> {
    fn surface(&self) -> &SurfaceDescriptor {
        (**self).surface()
    }

    fn size(&self) -> PhysicalSize {
        (**self).size()
    }

    fn pixel_ratio(&self) -> f32 {
        (**self).pixel_ratio()
    }

    fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
        (**self).resize(size)
    }

    fn activate(&mut self) -> Result<(), SurfaceError> {
        (**self).activate()
    }

    fn deactivate(&mut self) {
        (**self).deactivate();
    }

    fn swap(&mut self) -> Result<(), SurfaceError> {
        (**self).swap()
    }

    fn presents_implicitly(&self) -> bool {
        (**self).presents_implicitly()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        (**self).as_any_mut()
    }
}
