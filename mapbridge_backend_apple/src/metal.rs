// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `CAMetalLayer` backend.

use core::any::Any;
use core::ffi::c_void;
use core::fmt;

use mapbridge_core::backend::RendererBackend;
use mapbridge_core::error::SurfaceError;
use mapbridge_core::surface::{PhysicalSize, SurfaceDescriptor, SurfaceKind};
use objc2::rc::Retained;
use objc2_app_kit::NSView;
use objc2_core_foundation::{CGPoint, CGRect, CGSize};
use objc2_quartz_core::CAMetalLayer;
use raw_window_handle::{HasWindowHandle, RawWindowHandle};

/// A `CAMetalLayer` hosted in an `NSView`.
///
/// The layer fills the view's bounds. Its drawable size is the surface size in
/// physical pixels and its contents scale is the pixel ratio, so the layer's
/// frame in points is the logical size.
pub struct MetalLayerBackend {
    descriptor: SurfaceDescriptor,
    layer: Retained<CAMetalLayer>,
    view: Option<Retained<NSView>>,
    active: bool,
}

impl fmt::Debug for MetalLayerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalLayerBackend")
            .field("descriptor", &self.descriptor)
            .field("drawable_size", &self.layer.drawableSize())
            .field("attached", &self.view.is_some())
            .finish_non_exhaustive()
    }
}

impl MetalLayerBackend {
    /// Creates a layer inside the `NSView` behind `window`.
    ///
    /// Must be called on the main thread.
    ///
    /// # Errors
    ///
    /// - [`SurfaceError::NotRealized`] if either dimension is zero.
    /// - [`SurfaceError::Unsupported`] for anything but an AppKit handle.
    /// - [`SurfaceError::Creation`] if the view cannot be retained.
    pub fn new(
        window: &impl HasWindowHandle,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::NotRealized { width, height });
        }
        let descriptor = SurfaceDescriptor::from_window(window, width, height, pixel_ratio)?;
        let handle = window
            .window_handle()
            .map_err(|e| SurfaceError::Unsupported(e.to_string()))?;
        let RawWindowHandle::AppKit(appkit) = handle.as_raw() else {
            return Err(SurfaceError::Unsupported(format!(
                "Metal layer needs an AppKit view, got {:?}",
                descriptor.kind()
            )));
        };

        // SAFETY: an AppKit window handle points at a live `NSView` for as
        // long as the handle borrow is held; retaining it extends that.
        let view = unsafe { Retained::retain(appkit.ns_view.as_ptr().cast::<NSView>()) }
            .ok_or_else(|| SurfaceError::Creation("null NSView".into()))?;

        view.setWantsLayer(true);
        let root = view
            .layer()
            .ok_or_else(|| SurfaceError::Creation("NSView has no backing layer".into()))?;

        let layer = CAMetalLayer::new();
        root.addSublayer(&layer);
        let backend = Self {
            descriptor,
            layer,
            view: Some(view),
            active: false,
        };
        backend.sync_layer();
        tracing::debug!(size = %backend.descriptor.size(), pixel_ratio, "metal layer attached");
        Ok(backend)
    }

    /// Creates a layer that is not part of any view.
    ///
    /// The host adds [`layer`](Self::layer) to its own layer tree.
    ///
    /// # Errors
    ///
    /// As [`SurfaceDescriptor::new`].
    pub fn detached(width: u32, height: u32, pixel_ratio: f32) -> Result<Self, SurfaceError> {
        let descriptor = SurfaceDescriptor::new(SurfaceKind::AppKit, width, height, pixel_ratio)?;
        let backend = Self {
            descriptor,
            layer: CAMetalLayer::new(),
            view: None,
            active: false,
        };
        backend.sync_layer();
        Ok(backend)
    }

    /// The layer renderers draw into.
    #[must_use]
    pub fn layer(&self) -> &CAMetalLayer {
        &self.layer
    }

    /// Raw `CAMetalLayer*` for external renderers, valid while `self` lives.
    #[must_use]
    pub fn as_raw(&self) -> *mut c_void {
        let ptr: *const CAMetalLayer = &*self.layer;
        ptr as *mut c_void
    }

    /// Whether the layer was added to a host view.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.view.is_some()
    }

    fn sync_layer(&self) {
        let size = self.descriptor.size();
        let logical = self.descriptor.logical_size();
        self.layer.setContentsScale(f64::from(self.descriptor.pixel_ratio()));
        self.layer.setFrame(CGRect::new(
            CGPoint::new(0.0, 0.0),
            CGSize::new(logical.width, logical.height),
        ));
        self.layer
            .setDrawableSize(CGSize::new(f64::from(size.width), f64::from(size.height)));
    }
}

impl Drop for MetalLayerBackend {
    fn drop(&mut self) {
        if self.view.take().is_some() {
            self.layer.removeFromSuperlayer();
        }
    }
}

impl RendererBackend for MetalLayerBackend {
    fn surface(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
        if !self.descriptor.resize(size)? {
            return Ok(false);
        }
        self.sync_layer();
        tracing::debug!(%size, "metal layer resized");
        Ok(true)
    }

    fn activate(&mut self) -> Result<(), SurfaceError> {
        if self.active {
            return Err(SurfaceError::Frame("frame already active".into()));
        }
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    /// No-op: Core Animation presents the layer's drawables.
    fn swap(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn presents_implicitly(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
