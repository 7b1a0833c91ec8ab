// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The headless engine's map.
//!
//! Lives on its run loop's thread. Asynchronous work (style responses from a
//! loader, tile batches) comes back through a [`Mailbox`] drained by that
//! loop, so every state change and every observer event happens on the loop
//! thread between `run_once` calls.
//!
//! Each style load gets a generation number. Responses carry the generation
//! they were issued for and are dropped when a newer load has started.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use mapbridge_core::camera::{AnimationOptions, CameraOptions, LatLng, ScreenCoordinate};
use mapbridge_core::debug::MapDebugOptions;
use mapbridge_core::engine::{FrameParams, MapContext, NativeMap};
use mapbridge_core::error::{ConstructionError, MapLoadError};
use mapbridge_core::frontend::UpdateSink;
use mapbridge_core::observer::{
    CameraChangeMode, MapEvent, ObserverBridge, RenderFrameStatus, RenderMode, RendererObserver,
};
use mapbridge_core::options::ResourceOptions;
use mapbridge_core::run_loop::{Mailbox, MailboxSender};
use mapbridge_core::surface::PhysicalSize;

use crate::animation::Animation;
use crate::backend::Rgba8;
use crate::clock::Clock;
use crate::loader::{LoadError, ResourceLoader};
use crate::renderer::HeadlessFrame;
use crate::style::Style;
use crate::transform::Transform;

enum Message {
    Style {
        generation: u64,
        result: Result<String, LoadError>,
    },
    Tiles {
        generation: u64,
        source: String,
    },
}

struct State {
    transform: Transform,
    size: PhysicalSize,
    style: Option<Style>,
    style_loading: bool,
    /// The current load failed; the previous style stays drawn but the load
    /// never finishes.
    failed: bool,
    generation: u64,
    camera_moved: bool,
    animation: Option<Animation>,
    pending_tiles: usize,
    map_started: bool,
    map_loaded: bool,
    idle: bool,
    debug: MapDebugOptions,
    stats_view: bool,
    gesture: bool,
}

impl State {
    /// Whether a full frame now would finish the load and make the map idle.
    fn is_complete(&self) -> bool {
        self.style.is_some()
            && !self.style_loading
            && !self.failed
            && self.pending_tiles == 0
            && self.animation.is_none()
            && !self.gesture
    }
}

/// A [`NativeMap`] that keeps its camera in a Web Mercator [`Transform`] and
/// simulates style and tile loading.
pub struct HeadlessMap {
    state: RefCell<State>,
    sink: UpdateSink,
    observer: ObserverBridge,
    loader: Arc<dyn ResourceLoader>,
    clock: Arc<dyn Clock>,
    resources: ResourceOptions,
    pixel_ratio: f32,
    sender: MailboxSender<Message>,
    _mailbox: Mailbox<Message>,
}

impl fmt::Debug for HeadlessMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessMap")
            .field("size", &state.size)
            .field("generation", &state.generation)
            .field("camera", &state.transform.camera())
            .field("idle", &state.idle)
            .finish_non_exhaustive()
    }
}

impl HeadlessMap {
    /// Creates a map bound to the context's run loop.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::NoRunLoop`] if the context's loop is gone.
    pub fn new(
        context: MapContext,
        loader: Arc<dyn ResourceLoader>,
        clock: Arc<dyn Clock>,
    ) -> Result<Rc<Self>, ConstructionError> {
        let target: Rc<OnceCell<Weak<Self>>> = Rc::default();
        let handler_target = Rc::clone(&target);
        let (mailbox, sender) = context
            .scheduler
            .mailbox(move |msg: Message| {
                if let Some(map) = handler_target.get().and_then(Weak::upgrade) {
                    map.receive(msg);
                }
            })
            .map_err(|_| ConstructionError::NoRunLoop)?;
        let options = &context.map_options;
        let state = State {
            transform: Transform::new(options.size.to_logical(options.pixel_ratio))
                .with_north_orientation(options.north_orientation),
            size: options.size,
            style: None,
            style_loading: false,
            failed: false,
            generation: 0,
            camera_moved: false,
            animation: None,
            pending_tiles: 0,
            map_started: false,
            map_loaded: false,
            idle: true,
            debug: MapDebugOptions::NO_DEBUG,
            stats_view: false,
            gesture: false,
        };
        let map = Rc::new(Self {
            state: RefCell::new(state),
            sink: context.update_sink,
            observer: context.observer,
            loader,
            clock,
            resources: context.resource_options,
            pixel_ratio: options.pixel_ratio,
            sender,
            _mailbox: mailbox,
        });
        if target.set(Rc::downgrade(&map)).is_err() {
            tracing::error!("headless map mailbox bound twice");
        }
        Ok(map)
    }

    /// Number of style loads started.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// The loaded style, if any.
    #[must_use]
    pub fn style_name(&self) -> Option<String> {
        self.state.borrow().style.as_ref().and_then(|s| s.name.clone())
    }

    fn receive(&self, msg: Message) {
        match msg {
            Message::Style { generation, result } => self.on_style(generation, result),
            Message::Tiles { generation, source } => self.on_tiles(generation, &source),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let current = self.state.borrow().generation;
        if generation != current {
            tracing::debug!(generation, current, "dropping superseded load response");
        }
        generation == current
    }

    fn begin_load(&self) -> u64 {
        let generation = {
            let mut s = self.state.borrow_mut();
            s.generation += 1;
            s.style_loading = true;
            s.failed = false;
            s.camera_moved = false;
            s.pending_tiles = 0;
            s.map_started = false;
            s.map_loaded = false;
            s.idle = false;
            s.generation
        };
        self.observer.notify(MapEvent::WillStartLoadingMap);
        generation
    }

    fn on_style(&self, generation: u64, result: Result<String, LoadError>) {
        if !self.is_current(generation) {
            return;
        }
        let parsed = result
            .map_err(|err| {
                let kind = match &err {
                    LoadError::NotFound(_) => MapLoadError::NotFoundError,
                    LoadError::Transport(_) => MapLoadError::StyleLoadError,
                };
                (kind, err.to_string())
            })
            .and_then(|text| {
                Style::parse(&text).map_err(|err| (MapLoadError::StyleParseError, err.to_string()))
            });
        match parsed {
            Ok(style) => self.apply_style(generation, style),
            Err((error, message)) => {
                {
                    let mut s = self.state.borrow_mut();
                    s.style_loading = false;
                    s.failed = true;
                }
                tracing::warn!(%error, detail = %message, "style failed to load");
                self.observer
                    .notify(MapEvent::DidFailLoadingMap { error, message });
            }
        }
    }

    fn apply_style(&self, generation: u64, style: Style) {
        let mut events = Vec::new();
        let sources = {
            let mut s = self.state.borrow_mut();
            let defaults = CameraOptions {
                center: style.center,
                zoom: style.zoom,
                bearing: style.bearing,
                pitch: style.pitch,
                ..CameraOptions::default()
            };
            // A camera set by the host while loading wins over the style's.
            let apply = !s.camera_moved && !defaults.is_empty();
            if apply {
                events.push(MapEvent::CameraWillChange(CameraChangeMode::Immediate));
                s.transform.jump_to(&defaults);
                events.push(MapEvent::CameraDidChange(CameraChangeMode::Immediate));
            }
            events.push(MapEvent::DidFinishLoadingStyle);
            events.extend(style.missing_images().into_iter().map(MapEvent::StyleImageMissing));
            tracing::debug!(name = ?style.name, sources = style.sources.len(), "style loaded");
            let sources = style.sources.clone();
            s.pending_tiles = sources.len();
            s.style = Some(style);
            s.style_loading = false;
            sources
        };
        for event in events {
            self.observer.notify(event);
        }
        for source in sources {
            if self.sender.send(Message::Tiles { generation, source }).is_err() {
                tracing::debug!("run loop closed before tiles were requested");
            }
        }
        self.prepare();
    }

    fn on_tiles(&self, generation: u64, source: &str) {
        if !self.is_current(generation) {
            return;
        }
        {
            let mut s = self.state.borrow_mut();
            s.pending_tiles = s.pending_tiles.saturating_sub(1);
        }
        tracing::trace!(source, "tiles loaded");
        self.prepare();
    }

    /// Snapshots the state into frame params and hands them to the frontend.
    fn prepare(&self) {
        let (frame, size) = {
            let s = self.state.borrow();
            let loaded = s.style.is_some() && !s.style_loading;
            let frame = HeadlessFrame {
                camera: s.transform.camera(),
                size: s.size,
                background: s.style.as_ref().map_or(Rgba8::WHITE, |style| style.background),
                debug: s.debug,
                stats_view: s.stats_view,
                loading: s.style_loading || s.pending_tiles > 0,
                animating: s.animation.is_some(),
                map_started: loaded && !s.map_started,
                report_finish: s.is_complete() && !s.idle,
            };
            (frame, s.size)
        };
        if !self.sink.update(FrameParams::new(frame, size)) {
            tracing::trace!("frame prepared with no frontend attached");
        }
    }

    fn change_camera(&self, gesture: bool, apply: impl FnOnce(&mut Transform)) {
        self.observer
            .notify(MapEvent::CameraWillChange(CameraChangeMode::Immediate));
        {
            let mut s = self.state.borrow_mut();
            s.animation = None;
            apply(&mut s.transform);
            s.camera_moved = true;
            s.idle = false;
        }
        if gesture {
            self.observer.notify(MapEvent::CameraIsChanging);
        }
        self.observer
            .notify(MapEvent::CameraDidChange(CameraChangeMode::Immediate));
        self.prepare();
    }

    fn animate(&self, camera: &CameraOptions, animation: AnimationOptions, fly: bool) {
        if animation.duration.is_zero() {
            self.jump_to(camera);
            return;
        }
        {
            let mut s = self.state.borrow_mut();
            let from = s.transform;
            s.animation = Some(Animation::new(
                self.clock.now(),
                animation.duration,
                from,
                camera,
                fly,
            ));
            s.camera_moved = true;
            s.idle = false;
        }
        self.observer
            .notify(MapEvent::CameraWillChange(CameraChangeMode::Animated));
        self.prepare();
    }

    fn step_animation(&self) {
        let now = self.clock.now();
        let finished = {
            let mut s = self.state.borrow_mut();
            let Some((camera, done)) = s.animation.as_ref().map(|a| a.sample(now)) else {
                return;
            };
            // Only the camera comes from the animation; the viewport may have
            // been resized since it started.
            s.transform.jump_to(&camera.camera());
            if done {
                s.animation = None;
            }
            done
        };
        self.observer.notify(MapEvent::CameraIsChanging);
        if finished {
            self.observer
                .notify(MapEvent::CameraDidChange(CameraChangeMode::Animated));
        }
        self.prepare();
    }
}

impl RendererObserver for HeadlessMap {
    fn on_will_start_rendering_frame(&self) {
        self.observer.notify(MapEvent::WillStartRenderingFrame);
    }

    fn on_did_finish_rendering_frame(&self, status: RenderFrameStatus) {
        self.observer.notify(MapEvent::DidFinishRenderingFrame(status));
        self.step_animation();
    }

    fn on_will_start_rendering_map(&self) {
        self.state.borrow_mut().map_started = true;
        self.observer.notify(MapEvent::WillStartRenderingMap);
    }

    fn on_did_finish_rendering_map(&self, mode: RenderMode) {
        self.observer.notify(MapEvent::DidFinishRenderingMap(mode));
        if mode != RenderMode::Full {
            return;
        }
        let (loaded, idle) = {
            let mut s = self.state.borrow_mut();
            if !s.is_complete() {
                return;
            }
            let loaded = !s.map_loaded;
            let idle = !s.idle;
            s.map_loaded = true;
            s.idle = true;
            (loaded, idle)
        };
        if loaded {
            self.observer.notify(MapEvent::DidFinishLoadingMap);
        }
        if idle {
            self.observer.notify(MapEvent::DidBecomeIdle);
        }
    }
}

impl NativeMap for HeadlessMap {
    fn load_style_url(&self, url: &str) {
        let generation = self.begin_load();
        let url = self.resources.resolve_url(url);
        tracing::debug!(%url, generation, "loading style");
        let sender = self.sender.clone();
        self.loader.request(
            &url,
            Box::new(move |result| {
                if sender.send(Message::Style { generation, result }).is_err() {
                    tracing::debug!("map gone before its style arrived");
                }
            }),
        );
    }

    fn load_style_json(&self, json: &str) {
        let generation = self.begin_load();
        let result = Ok(json.to_owned());
        if self.sender.send(Message::Style { generation, result }).is_err() {
            tracing::debug!("run loop closed before the style was parsed");
        }
    }

    fn jump_to(&self, camera: &CameraOptions) {
        self.change_camera(false, |t| t.jump_to(camera));
    }

    fn ease_to(&self, camera: &CameraOptions, animation: AnimationOptions) {
        self.animate(camera, animation, false);
    }

    fn fly_to(&self, camera: &CameraOptions, animation: AnimationOptions) {
        self.animate(camera, animation, true);
    }

    fn camera_options(&self) -> CameraOptions {
        self.state.borrow().transform.camera()
    }

    fn set_size(&self, size: PhysicalSize) {
        {
            let mut s = self.state.borrow_mut();
            s.size = size;
            s.transform.set_size(size.to_logical(self.pixel_ratio));
            s.idle = false;
        }
        self.prepare();
    }

    fn size(&self) -> PhysicalSize {
        self.state.borrow().size
    }

    fn move_by(&self, delta: ScreenCoordinate) {
        self.change_camera(true, |t| t.move_by(delta.to_point().to_vec2()));
    }

    fn scale_by(&self, scale: f64, anchor: Option<ScreenCoordinate>) {
        self.change_camera(true, |t| t.scale_by(scale, anchor));
    }

    fn rotate_by(&self, first: ScreenCoordinate, second: ScreenCoordinate) {
        self.change_camera(true, |t| t.rotate_by(first, second));
    }

    fn pitch_by(&self, delta: f64) {
        self.change_camera(true, |t| t.pitch_by(delta));
    }

    fn set_gesture_in_progress(&self, in_progress: bool) {
        let ended = {
            let mut s = self.state.borrow_mut();
            let ended = s.gesture && !in_progress;
            s.gesture = in_progress;
            if ended {
                s.idle = false;
            }
            ended
        };
        // Idle is held back while a gesture runs; the next full frame reports it.
        if ended {
            self.prepare();
        }
    }

    fn is_gesture_in_progress(&self) -> bool {
        self.state.borrow().gesture
    }

    fn pixel_for_lat_lng(&self, lat_lng: LatLng) -> ScreenCoordinate {
        self.state.borrow().transform.pixel_for(lat_lng)
    }

    fn lat_lng_for_pixel(&self, pixel: ScreenCoordinate) -> LatLng {
        self.state.borrow().transform.lat_lng_for(pixel)
    }

    fn set_debug(&self, options: MapDebugOptions) {
        self.state.borrow_mut().debug = options;
        self.prepare();
    }

    fn debug(&self) -> MapDebugOptions {
        self.state.borrow().debug
    }

    fn set_rendering_stats_view_enabled(&self, enabled: bool) {
        self.state.borrow_mut().stats_view = enabled;
        self.prepare();
    }

    fn is_rendering_stats_view_enabled(&self) -> bool {
        self.state.borrow().stats_view
    }

    fn trigger_repaint(&self) {
        self.prepare();
    }
}
