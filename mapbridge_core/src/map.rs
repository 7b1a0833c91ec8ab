// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The map facade.
//!
//! A [`Map`] binds a [`RendererFrontend`], an [`ObserverBridge`] and the three
//! option records into one engine map. It is the object hosts hold on to.
//! Everything that moves the camera, loads a style or toggles debug overlays
//! goes through it; rendering goes through [`tick`](Map::tick).
//!
//! Camera state lives in the engine. The facade validates input, forwards it,
//! and reads the state back on request.

use core::fmt;
use std::rc::Rc;

use crate::backend::RendererBackend;
use crate::camera::{AnimationOptions, CameraOptions, LatLng, ScreenCoordinate};
use crate::debug::MapDebugOptions;
use crate::engine::{MapContext, MapEngine, NativeMap};
use crate::error::{CameraError, ConstructionError, Error, LifecycleError, SurfaceError};
use crate::frontend::{RendererBinding, RendererFrontend};
use crate::handle::{NativeHandle, NativeRef};
use crate::library;
use crate::observer::{ObserverBridge, RendererObserver};
use crate::options::{ClientOptions, MapOptions, ResourceOptions};
use crate::run_loop::Scheduler;
use crate::surface::PhysicalSize;

/// One map instance bound to a frontend.
///
/// `Map` is `!Send`: it lives on the thread whose run loop it was created
/// with. Dropping it destroys the engine map; [`close`](Self::close) does the
/// same earlier. The frontend and observer bridge outlive neither unless the
/// host kept its own clones.
pub struct Map<B: RendererBackend> {
    native: NativeHandle<dyn NativeMap>,
    frontend: RendererFrontend<B>,
    binding: RendererBinding,
    observer: ObserverBridge,
    map_options: MapOptions,
    resource_options: ResourceOptions,
    client_options: ClientOptions,
}

impl<B: RendererBackend> fmt::Debug for Map<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("native", &self.native)
            .field("frontend", &self.frontend)
            .field("map_options", &self.map_options)
            .finish_non_exhaustive()
    }
}

impl<B: RendererBackend> Map<B> {
    /// Creates a map with `engine`.
    ///
    /// # Errors
    ///
    /// - [`ConstructionError::NoRunLoop`] without a run loop on this thread.
    /// - [`ConstructionError::InvalidOptions`] if any option record is
    ///   invalid.
    /// - Whatever the engine reports when it cannot create the map.
    pub fn new(
        engine: &dyn MapEngine,
        frontend: RendererFrontend<B>,
        observer: ObserverBridge,
        map_options: MapOptions,
        resource_options: ResourceOptions,
        client_options: ClientOptions,
    ) -> Result<Self, ConstructionError> {
        let scheduler = Scheduler::current().ok_or(ConstructionError::NoRunLoop)?;
        let remote = scheduler
            .remote()
            .map_err(|_| ConstructionError::NoRunLoop)?;
        map_options.validate()?;
        resource_options.validate()?;

        let native = engine.create_map(MapContext {
            update_sink: frontend.update_sink(),
            observer: observer.clone(),
            scheduler,
            remote,
            map_options: map_options.clone(),
            resource_options: resource_options.clone(),
            client_options: client_options.clone(),
        })?;
        let binding = frontend.bind_renderer(engine.create_renderer(frontend.pixel_ratio()));
        let renderer_observer: Rc<dyn RendererObserver> = native.clone();
        frontend.set_observer(&renderer_observer);

        let native = NativeHandle::from_rc(native);
        tracing::debug!(
            map = %native.reference(),
            engine = engine.name(),
            size = %map_options.size,
            "map created"
        );
        Ok(Self {
            native,
            frontend,
            binding,
            observer,
            map_options,
            resource_options,
            client_options,
        })
    }

    /// Creates a map with the process-wide engine from
    /// [`library::load`](crate::library::load).
    ///
    /// # Errors
    ///
    /// [`ConstructionError::LibraryNotLoaded`] before the library was loaded,
    /// otherwise as [`new`](Self::new).
    pub fn with_library(
        frontend: RendererFrontend<B>,
        observer: ObserverBridge,
        map_options: MapOptions,
        resource_options: ResourceOptions,
        client_options: ClientOptions,
    ) -> Result<Self, ConstructionError> {
        Self::new(
            library::engine()?,
            frontend,
            observer,
            map_options,
            resource_options,
            client_options,
        )
    }

    fn native(&self) -> Result<Rc<dyn NativeMap>, LifecycleError> {
        self.native.access()
    }

    /// Reference of the engine map.
    #[must_use]
    pub fn reference(&self) -> NativeRef {
        self.native.reference()
    }

    /// Starts loading the style at `url`.
    ///
    /// Returns as soon as the request is issued. The outcome arrives through
    /// the observer as `did_finish_loading_style` or
    /// `did_fail_loading_map`, always after `will_start_loading_map`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn load_style_url(&self, url: &str) -> Result<(), Error> {
        let native = self.native()?;
        tracing::debug!(map = %self.reference(), url, "loading style");
        native.load_style_url(url);
        Ok(())
    }

    /// Starts loading a style from a JSON document. Reports like
    /// [`load_style_url`](Self::load_style_url).
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn load_style_json(&self, json: &str) -> Result<(), Error> {
        self.native()?.load_style_json(json);
        Ok(())
    }

    /// Applies `camera` immediately. Unset fields keep their values.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError`] if the options are invalid; nothing is applied.
    pub fn jump_to(&self, camera: &CameraOptions) -> Result<(), Error> {
        let native = self.native()?;
        camera.validate()?;
        native.jump_to(camera);
        Ok(())
    }

    /// Animates to `camera` along a straight path.
    ///
    /// Cancels any running animation.
    ///
    /// # Errors
    ///
    /// As [`jump_to`](Self::jump_to).
    pub fn ease_to(
        &self,
        camera: &CameraOptions,
        animation: AnimationOptions,
    ) -> Result<(), Error> {
        let native = self.native()?;
        camera.validate()?;
        native.ease_to(camera, animation);
        Ok(())
    }

    /// Animates to `camera`, zooming out and back in over long distances.
    ///
    /// Cancels any running animation.
    ///
    /// # Errors
    ///
    /// As [`jump_to`](Self::jump_to).
    pub fn fly_to(&self, camera: &CameraOptions, animation: AnimationOptions) -> Result<(), Error> {
        let native = self.native()?;
        camera.validate()?;
        native.fly_to(camera, animation);
        Ok(())
    }

    /// The current camera.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn camera_options(&self) -> Result<CameraOptions, Error> {
        Ok(self.native()?.camera_options())
    }

    /// Tells the engine the viewport size.
    ///
    /// Resize the backend first with
    /// [`RendererFrontend::resize`]; until both agree, frames are prepared for
    /// a size the surface does not have.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`SurfaceError::NotRealized`] for an empty size.
    pub fn set_size(&self, size: PhysicalSize) -> Result<(), Error> {
        let native = self.native()?;
        if size.is_empty() {
            return Err(SurfaceError::NotRealized {
                width: size.width,
                height: size.height,
            }
            .into());
        }
        native.set_size(size);
        Ok(())
    }

    /// Current viewport size.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn size(&self) -> Result<PhysicalSize, Error> {
        Ok(self.native()?.size())
    }

    /// Pans the map by a screen-space delta in logical pixels.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for a NaN or infinite delta.
    pub fn move_by(&self, delta: ScreenCoordinate) -> Result<(), Error> {
        let native = self.native()?;
        finite_point("delta", delta)?;
        native.move_by(delta);
        Ok(())
    }

    /// Zooms by `scale` (2.0 zooms in one level) around `anchor`, or around
    /// the viewport center when `anchor` is `None`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for a non-finite or non-positive scale,
    ///   or a non-finite anchor.
    pub fn scale_by(&self, scale: f64, anchor: Option<ScreenCoordinate>) -> Result<(), Error> {
        let native = self.native()?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CameraError::NotFinite("scale").into());
        }
        if let Some(anchor) = anchor {
            finite_point("anchor", anchor)?;
        }
        native.scale_by(scale, anchor);
        Ok(())
    }

    /// Rotates by the angle swept from `first` to `second` around the
    /// viewport center.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for non-finite points.
    pub fn rotate_by(
        &self,
        first: ScreenCoordinate,
        second: ScreenCoordinate,
    ) -> Result<(), Error> {
        let native = self.native()?;
        finite_point("first", first)?;
        finite_point("second", second)?;
        native.rotate_by(first, second);
        Ok(())
    }

    /// Tilts by `delta` degrees.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for a non-finite delta.
    pub fn pitch_by(&self, delta: f64) -> Result<(), Error> {
        let native = self.native()?;
        if !delta.is_finite() {
            return Err(CameraError::NotFinite("pitch").into());
        }
        native.pitch_by(delta);
        Ok(())
    }

    /// Marks the start or end of a user gesture.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn set_gesture_in_progress(&self, in_progress: bool) -> Result<(), Error> {
        self.native()?.set_gesture_in_progress(in_progress);
        Ok(())
    }

    /// Whether a user gesture is in progress.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn is_gesture_in_progress(&self) -> Result<bool, Error> {
        Ok(self.native()?.is_gesture_in_progress())
    }

    /// Screen position of `lat_lng` in logical pixels.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for an invalid coordinate.
    pub fn pixel_for_lat_lng(&self, lat_lng: LatLng) -> Result<ScreenCoordinate, Error> {
        let native = self.native()?;
        if !lat_lng.is_valid() {
            return Err(CameraError::NotFinite("lat_lng").into());
        }
        Ok(native.pixel_for_lat_lng(lat_lng))
    }

    /// Geographic coordinate under the logical screen point `pixel`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`CameraError::NotFinite`] for a non-finite point.
    pub fn lat_lng_for_pixel(&self, pixel: ScreenCoordinate) -> Result<LatLng, Error> {
        let native = self.native()?;
        finite_point("pixel", pixel)?;
        Ok(native.lat_lng_for_pixel(pixel))
    }

    /// Sets the debug overlays.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn set_debug(&self, options: MapDebugOptions) -> Result<(), Error> {
        self.native()?.set_debug(options);
        Ok(())
    }

    /// Current debug overlays.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn debug(&self) -> Result<MapDebugOptions, Error> {
        Ok(self.native()?.debug())
    }

    /// Shows or hides the rendering statistics overlay.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn set_rendering_stats_view_enabled(&self, enabled: bool) -> Result<(), Error> {
        self.native()?.set_rendering_stats_view_enabled(enabled);
        Ok(())
    }

    /// Whether the rendering statistics overlay is shown.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn is_rendering_stats_view_enabled(&self) -> Result<bool, Error> {
        Ok(self.native()?.is_rendering_stats_view_enabled())
    }

    /// Asks the engine for a new frame even if nothing changed.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    pub fn trigger_repaint(&self) -> Result<(), Error> {
        self.native()?.trigger_repaint();
        Ok(())
    }

    /// Pumps the run loop and renders if anything changed.
    ///
    /// Call this from the host's frame timer. Returns whether a frame was
    /// drawn.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - Whatever [`RendererFrontend::render`] reports.
    pub fn tick(&self) -> Result<bool, Error> {
        self.native()?;
        self.frontend.tick()
    }

    /// Destroys the engine map and unbinds its renderer from the frontend.
    ///
    /// Idempotent. The frontend and its backend stay usable for a new map. If a
    /// newer map has bound the same frontend since, its renderer is kept.
    pub fn close(&self) {
        if self.native.destroy() {
            let unbound = self.frontend.unbind(self.binding);
            tracing::debug!(map = %self.reference(), unbound, "map closed");
        }
    }

    /// Returns whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.native.is_destroyed()
    }

    /// The frontend this map renders through.
    #[must_use]
    pub fn frontend(&self) -> &RendererFrontend<B> {
        &self.frontend
    }

    /// The bridge this map reports through.
    #[must_use]
    pub fn observer(&self) -> &ObserverBridge {
        &self.observer
    }

    /// Map options the map was created with.
    #[must_use]
    pub fn options(&self) -> &MapOptions {
        &self.map_options
    }

    /// Resource options the map was created with.
    #[must_use]
    pub fn resource_options(&self) -> &ResourceOptions {
        &self.resource_options
    }

    /// Client options the map was created with.
    #[must_use]
    pub fn client_options(&self) -> &ClientOptions {
        &self.client_options
    }
}

impl<B: RendererBackend> Drop for Map<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn finite_point(name: &'static str, point: ScreenCoordinate) -> Result<(), CameraError> {
    if point.x.is_finite() && point.y.is_finite() {
        Ok(())
    } else {
        Err(CameraError::NotFinite(name))
    }
}

#[cfg(test)]
mod tests {
    use core::any::Any;
    use core::cell::Cell;

    use super::*;
    use crate::engine::{FrameParams, NativeRenderer, RenderReport};
    use crate::error::RenderError;
    use crate::frontend::UpdateSink;
    use crate::observer::{MapEvent, RenderFrameStatus};
    use crate::run_loop::RunLoop;
    use crate::surface::SurfaceDescriptor;

    struct Offscreen(SurfaceDescriptor);

    impl RendererBackend for Offscreen {
        fn surface(&self) -> &SurfaceDescriptor {
            &self.0
        }

        fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
            self.0.resize(size)
        }

        fn activate(&mut self) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn deactivate(&mut self) {}

        fn swap(&mut self) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct StubMap {
        sink: UpdateSink,
        camera: Cell<CameraOptions>,
        size: Cell<PhysicalSize>,
        debug: Cell<MapDebugOptions>,
        stats: Cell<bool>,
        gesture: Cell<bool>,
        observer: ObserverBridge,
    }

    impl StubMap {
        fn prepare(&self) {
            self.sink.update(FrameParams::new((), self.size.get()));
        }
    }

    impl RendererObserver for StubMap {
        fn on_did_finish_rendering_frame(&self, status: RenderFrameStatus) {
            self.observer
                .notify(MapEvent::DidFinishRenderingFrame(status));
        }
    }

    impl NativeMap for StubMap {
        fn load_style_url(&self, _url: &str) {}

        fn load_style_json(&self, _json: &str) {}

        fn jump_to(&self, camera: &CameraOptions) {
            self.camera.set(self.camera.get().merged(camera));
            self.prepare();
        }

        fn ease_to(&self, camera: &CameraOptions, _animation: AnimationOptions) {
            self.jump_to(camera);
        }

        fn fly_to(&self, camera: &CameraOptions, _animation: AnimationOptions) {
            self.jump_to(camera);
        }

        fn camera_options(&self) -> CameraOptions {
            self.camera.get()
        }

        fn set_size(&self, size: PhysicalSize) {
            self.size.set(size);
            self.prepare();
        }

        fn size(&self) -> PhysicalSize {
            self.size.get()
        }

        fn move_by(&self, _delta: ScreenCoordinate) {
            self.prepare();
        }

        fn scale_by(&self, scale: f64, _anchor: Option<ScreenCoordinate>) {
            let zoom = self.camera.get().zoom.unwrap_or(0.0) + scale.log2();
            self.jump_to(&CameraOptions::default().with_zoom(zoom));
        }

        fn rotate_by(&self, _first: ScreenCoordinate, _second: ScreenCoordinate) {}

        fn pitch_by(&self, _delta: f64) {}

        fn set_gesture_in_progress(&self, in_progress: bool) {
            self.gesture.set(in_progress);
        }

        fn is_gesture_in_progress(&self) -> bool {
            self.gesture.get()
        }

        fn pixel_for_lat_lng(&self, lat_lng: LatLng) -> ScreenCoordinate {
            ScreenCoordinate::new(lat_lng.longitude, lat_lng.latitude)
        }

        fn lat_lng_for_pixel(&self, pixel: ScreenCoordinate) -> LatLng {
            LatLng::new(pixel.y, pixel.x)
        }

        fn set_debug(&self, options: MapDebugOptions) {
            self.debug.set(options);
        }

        fn debug(&self) -> MapDebugOptions {
            self.debug.get()
        }

        fn set_rendering_stats_view_enabled(&self, enabled: bool) {
            self.stats.set(enabled);
        }

        fn is_rendering_stats_view_enabled(&self) -> bool {
            self.stats.get()
        }

        fn trigger_repaint(&self) {
            self.prepare();
        }
    }

    struct StubRenderer;

    impl NativeRenderer for StubRenderer {
        fn render(
            &mut self,
            _backend: &mut dyn RendererBackend,
            _params: &FrameParams,
        ) -> Result<RenderReport, RenderError> {
            Ok(RenderReport::full())
        }
    }

    struct StubEngine;

    impl MapEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        fn create_map(&self, context: MapContext) -> Result<Rc<dyn NativeMap>, ConstructionError> {
            Ok(Rc::new(StubMap {
                sink: context.update_sink,
                camera: Cell::new(CameraOptions::centered(LatLng::default(), 0.0)),
                size: Cell::new(context.map_options.size),
                debug: Cell::new(MapDebugOptions::NO_DEBUG),
                stats: Cell::new(false),
                gesture: Cell::new(false),
                observer: context.observer,
            }))
        }

        fn create_renderer(&self, _pixel_ratio: f32) -> Box<dyn NativeRenderer> {
            Box::new(StubRenderer)
        }
    }

    fn frontend() -> RendererFrontend<Offscreen> {
        let surface = SurfaceDescriptor::offscreen(400, 300, 1.0).unwrap();
        RendererFrontend::new(Offscreen(surface), 1.0).unwrap()
    }

    fn map(frontend: RendererFrontend<Offscreen>) -> Result<Map<Offscreen>, ConstructionError> {
        Map::new(
            &StubEngine,
            frontend,
            ObserverBridge::noop(),
            MapOptions::default().with_size(PhysicalSize::new(400, 300)),
            ResourceOptions::default(),
            ClientOptions::default(),
        )
    }

    #[test]
    fn construction_needs_a_run_loop() {
        let rl = RunLoop::new().unwrap();
        let fe = frontend();
        drop(rl);
        assert_eq!(
            map(fe).err(),
            Some(ConstructionError::NoRunLoop),
            "run loop is gone"
        );
    }

    #[test]
    fn invalid_options_are_rejected() {
        let _rl = RunLoop::new().unwrap();
        let result = Map::new(
            &StubEngine,
            frontend(),
            ObserverBridge::noop(),
            MapOptions::default().with_pixel_ratio(0.0),
            ResourceOptions::default(),
            ClientOptions::default(),
        );
        assert!(
            matches!(result, Err(ConstructionError::InvalidOptions(_))),
            "zero pixel ratio"
        );
    }

    #[test]
    fn jump_to_updates_only_set_fields() {
        let _rl = RunLoop::new().unwrap();
        let map = map(frontend()).unwrap();
        map.jump_to(&CameraOptions::centered(LatLng::new(10.0, 20.0), 5.0))
            .unwrap();
        map.jump_to(&CameraOptions::default().with_bearing(45.0))
            .unwrap();
        let camera = map.camera_options().unwrap();
        assert_eq!(camera.center, Some(LatLng::new(10.0, 20.0)), "center kept");
        assert_eq!(camera.zoom, Some(5.0), "zoom kept");
        assert_eq!(camera.bearing, Some(45.0), "bearing applied");
    }

    #[test]
    fn center_with_anchor_never_reaches_engine() {
        let _rl = RunLoop::new().unwrap();
        let map = map(frontend()).unwrap();
        let before = map.camera_options().unwrap();
        let bad = CameraOptions::centered(LatLng::new(1.0, 1.0), 9.0)
            .with_anchor(ScreenCoordinate::new(3.0, 3.0));
        assert_eq!(
            map.ease_to(&bad, AnimationOptions::EASE_DEFAULT),
            Err(Error::Camera(CameraError::CenterAndAnchor)),
            "rejected"
        );
        assert_eq!(map.camera_options().unwrap(), before, "camera untouched");
        assert!(!map.frontend().is_dirty(), "no frame prepared");
    }

    #[test]
    fn engine_updates_drive_ticks() {
        let _rl = RunLoop::new().unwrap();
        let map = map(frontend()).unwrap();
        map.set_gesture_in_progress(true).unwrap();
        map.move_by(ScreenCoordinate::new(10.0, 0.0)).unwrap();
        map.set_gesture_in_progress(false).unwrap();
        assert!(map.frontend().is_dirty(), "move prepared a frame");
        assert_eq!(map.tick(), Ok(true), "tick drew it");
        assert!(!map.frontend().is_dirty(), "clean afterwards");
        assert_eq!(map.tick(), Ok(false), "nothing new");
        assert_eq!(
            map.observer().delivered_count(),
            1,
            "render events reach the engine map"
        );
    }

    #[test]
    fn gesture_validation() {
        let _rl = RunLoop::new().unwrap();
        let map = map(frontend()).unwrap();
        assert_eq!(
            map.scale_by(0.0, None),
            Err(Error::Camera(CameraError::NotFinite("scale"))),
            "zero scale"
        );
        map.scale_by(4.0, None).unwrap();
        assert_eq!(map.camera_options().unwrap().zoom, Some(2.0), "two levels");
        assert!(
            map.move_by(ScreenCoordinate::new(f64::NAN, 0.0)).is_err(),
            "NaN delta"
        );
        assert!(
            map.set_size(PhysicalSize::new(0, 10)).is_err(),
            "empty size"
        );
    }

    #[test]
    fn debug_and_stats_round_trip() {
        let _rl = RunLoop::new().unwrap();
        let map = map(frontend()).unwrap();
        let flags = MapDebugOptions::TILE_BORDERS | MapDebugOptions::COLLISION;
        map.set_debug(flags).unwrap();
        map.set_rendering_stats_view_enabled(true).unwrap();
        assert_eq!(map.debug(), Ok(flags), "debug flags");
        assert_eq!(map.is_rendering_stats_view_enabled(), Ok(true), "stats");
    }

    #[test]
    fn close_is_idempotent_and_fails_later_calls() {
        let _rl = RunLoop::new().unwrap();
        let fe = frontend();
        let map = map(fe.clone()).unwrap();
        map.trigger_repaint().unwrap();
        map.close();
        map.close();
        assert!(map.is_closed(), "closed");
        let gone = Error::Lifecycle(LifecycleError::UseAfterFree {
            reference: map.reference(),
        });
        assert_eq!(
            map.load_style_url("file://style.json"),
            Err(gone.clone()),
            "style"
        );
        assert_eq!(map.camera_options(), Err(gone.clone()), "camera");
        assert_eq!(map.tick(), Err(gone), "tick");
        assert_eq!(fe.render(), Ok(false), "frontend forgot the map's frames");
        assert!(!fe.is_closed(), "backend survives the map");
    }

    #[test]
    fn closing_an_older_map_keeps_the_newer_renderer() {
        let _rl = RunLoop::new().unwrap();
        let fe = frontend();
        let first = map(fe.clone()).unwrap();
        let second = map(fe.clone()).unwrap();
        first.close();
        assert!(first.is_closed(), "first closed");
        second.trigger_repaint().unwrap();
        assert_eq!(second.tick(), Ok(true), "second map still draws");

        second.close();
        assert_eq!(fe.render(), Ok(false), "last owner unbinds");
    }
}
