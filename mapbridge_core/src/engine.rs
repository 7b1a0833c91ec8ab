// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between the bridge and a map engine.
//!
//! The engine is opaque: it owns style parsing, tile loading, the camera
//! transform and the actual drawing. The bridge only needs the operations
//! below. An engine implementation is installed once per process through
//! [`library::load`](crate::library::load).
//!
//! Data flows one way through the seam. The [`NativeMap`] prepares
//! [`FrameParams`] and pushes them into the frontend through its
//! [`UpdateSink`]. The frontend later hands the same params to the engine's
//! [`NativeRenderer`], which draws them into the backend.

use core::any::Any;
use core::fmt;
use std::rc::Rc;

use crate::backend::RendererBackend;
use crate::camera::{AnimationOptions, CameraOptions, LatLng, ScreenCoordinate};
use crate::debug::MapDebugOptions;
use crate::error::{ConstructionError, RenderError};
use crate::frontend::UpdateSink;
use crate::observer::{ObserverBridge, RenderFrameStatus, RenderMode, RendererObserver};
use crate::options::{ClientOptions, MapOptions, ResourceOptions};
use crate::run_loop::{RemoteScheduler, Scheduler};
use crate::surface::PhysicalSize;

/// An opaque snapshot of everything needed to draw one frame.
///
/// Created by the engine's map, stored by the frontend, and read back only by
/// the same engine's renderer.
#[derive(Clone)]
pub struct FrameParams {
    payload: Rc<dyn Any>,
    size: PhysicalSize,
}

impl fmt::Debug for FrameParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameParams")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl FrameParams {
    /// Wraps an engine-specific payload prepared for a `size` framebuffer.
    pub fn new<T: Any>(payload: T, size: PhysicalSize) -> Self {
        Self {
            payload: Rc::new(payload),
            size,
        }
    }

    /// Framebuffer size the params were prepared for.
    #[must_use]
    pub fn size(&self) -> PhysicalSize {
        self.size
    }

    /// Returns the payload if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

/// What a renderer reports after drawing one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderReport {
    /// Frame outcome, forwarded to the renderer observer.
    pub status: RenderFrameStatus,
    /// This frame is the first of a newly loaded map.
    pub map_started: bool,
    /// The map finished rendering in this frame.
    pub map_finished: Option<RenderMode>,
}

impl RenderReport {
    /// A complete frame with nothing further to do.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            status: RenderFrameStatus {
                mode: RenderMode::Full,
                needs_repaint: false,
                placement_changed: false,
            },
            map_started: false,
            map_finished: None,
        }
    }
}

/// Draws frames prepared by the engine's map.
pub trait NativeRenderer {
    /// Draws `params` into `backend`.
    ///
    /// The backend is already activated; the frontend presents and
    /// deactivates it afterwards.
    ///
    /// # Errors
    ///
    /// [`RenderError`] if the frame could not be drawn.
    fn render(
        &mut self,
        backend: &mut dyn RendererBackend,
        params: &FrameParams,
    ) -> Result<RenderReport, RenderError>;
}

/// One engine map instance.
///
/// All methods take `&self`; implementations use interior mutability and are
/// only ever called on the map's thread. Operations that complete later
/// (style loads, animations) report through the [`ObserverBridge`] they were
/// given at construction.
///
/// The map also observes the frontend's rendering, which is how it learns
/// that a frame reached the screen.
pub trait NativeMap: RendererObserver {
    /// Starts loading a style by URL.
    fn load_style_url(&self, url: &str);
    /// Starts loading a style from a JSON document.
    fn load_style_json(&self, json: &str);

    /// Applies a validated camera immediately.
    fn jump_to(&self, camera: &CameraOptions);
    /// Animates to a validated camera along a straight path.
    fn ease_to(&self, camera: &CameraOptions, animation: AnimationOptions);
    /// Animates to a validated camera with a zoom-out arc.
    fn fly_to(&self, camera: &CameraOptions, animation: AnimationOptions);
    /// Current camera. `center`, `zoom`, `bearing`, `pitch` and `padding` are
    /// always set; `anchor` never is.
    fn camera_options(&self) -> CameraOptions;

    /// Sets the viewport size in physical pixels.
    fn set_size(&self, size: PhysicalSize);
    /// Viewport size in physical pixels.
    fn size(&self) -> PhysicalSize;

    /// Pans by a screen-space delta.
    fn move_by(&self, delta: ScreenCoordinate);
    /// Zooms by a scale factor around `anchor` (the center when `None`).
    fn scale_by(&self, scale: f64, anchor: Option<ScreenCoordinate>);
    /// Rotates by the angle between two screen points, measured around the
    /// viewport center.
    fn rotate_by(&self, first: ScreenCoordinate, second: ScreenCoordinate);
    /// Tilts by `delta` degrees.
    fn pitch_by(&self, delta: f64);
    /// Marks the start or end of a user gesture.
    fn set_gesture_in_progress(&self, in_progress: bool);
    /// Whether a gesture is in progress.
    fn is_gesture_in_progress(&self) -> bool;

    /// Projects a coordinate to a screen point.
    fn pixel_for_lat_lng(&self, lat_lng: LatLng) -> ScreenCoordinate;
    /// Unprojects a screen point to a coordinate.
    fn lat_lng_for_pixel(&self, pixel: ScreenCoordinate) -> LatLng;

    /// Sets debug overlays.
    fn set_debug(&self, options: MapDebugOptions);
    /// Current debug overlays.
    fn debug(&self) -> MapDebugOptions;
    /// Shows or hides the rendering statistics overlay.
    fn set_rendering_stats_view_enabled(&self, enabled: bool);
    /// Whether the rendering statistics overlay is shown.
    fn is_rendering_stats_view_enabled(&self) -> bool;

    /// Prepares a new frame even if nothing changed.
    fn trigger_repaint(&self);
}

/// Everything an engine map may hold on to.
#[derive(Debug)]
pub struct MapContext {
    /// Where prepared frames go.
    pub update_sink: UpdateSink,
    /// Where events go.
    pub observer: ObserverBridge,
    /// The map thread's run loop.
    pub scheduler: Scheduler,
    /// The same run loop, reachable from worker threads.
    pub remote: RemoteScheduler,
    /// Map options.
    pub map_options: MapOptions,
    /// Resource options.
    pub resource_options: ResourceOptions,
    /// Client options.
    pub client_options: ClientOptions,
}

/// A map engine: a factory for maps and renderers.
///
/// One engine is installed per process and shared by every map thread.
pub trait MapEngine: Send + Sync {
    /// Engine name for diagnostics.
    fn name(&self) -> &str;

    /// Creates a map bound to the given context.
    ///
    /// # Errors
    ///
    /// [`ConstructionError`] if the engine cannot create the map.
    fn create_map(&self, context: MapContext) -> Result<Rc<dyn NativeMap>, ConstructionError>;

    /// Creates a renderer for frames at `pixel_ratio`.
    fn create_renderer(&self, pixel_ratio: f32) -> Box<dyn NativeRenderer>;
}
