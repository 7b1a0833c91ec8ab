// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tour of the Mapbridge data flow on the headless engine.
//!
//! Builds the full stack in the documented order (run loop, backend,
//! frontend, observer bridge, map), loads a style through a threaded loader,
//! animates the camera, runs a gesture, resizes, toggles debug overlays and
//! tears everything down. Every map event is logged through `tracing`; set
//! `RUST_LOG=debug` to also see the lifecycle edges inside the crates.
//!
//! Pass a path to a style JSON file to load it instead of the built-in one.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mapbridge_core::error::MapLoadError;
use mapbridge_core::observer::{CameraChangeMode, MapObserver, RenderFrameStatus, RenderMode};
use mapbridge_core::options::{ClientOptions, MapOptions, ResourceOptions};
use mapbridge_core::surface::PhysicalSize;
use mapbridge_core::{
    AnimationOptions, CameraOptions, LatLng, Map, MapDebugOptions, ObserverBridge,
    RendererFrontend, RunLoop, ScreenCoordinate,
};
use mapbridge_harness::{HeadlessBackend, HeadlessEngine, MemoryLoader, ThreadedLoader};
use tracing_subscriber::EnvFilter;

/// Served in place of the demo tile server's style.
const STYLE: &str = r##"{
    "version": 8,
    "name": "Tour",
    "center": [-122.42, 37.77],
    "zoom": 10,
    "sources": {
        "openmaptiles": {"type": "vector"},
        "hillshade": {"type": "raster-dem"}
    },
    "images": ["marker"],
    "layers": [
        {"id": "background", "type": "background", "paint": {"background-color": "#d8e4ec"}},
        {"id": "pois", "type": "symbol", "layout": {"icon-image": "marker"}},
        {"id": "transit", "type": "symbol", "layout": {"icon-image": "rail"}}
    ]
}"##;

const STYLE_URL: &str = "maplibre://style.json";
const LOGICAL_SIZE: (f64, f64) = (480.0, 320.0);
const PIXEL_RATIO: f32 = 2.0;
const FRAME: Duration = Duration::from_millis(16);

/// Logs every event and remembers when the map went idle.
struct TourObserver {
    idle: Rc<Cell<bool>>,
}

impl MapObserver for TourObserver {
    fn on_camera_will_change(&mut self, mode: CameraChangeMode) {
        self.idle.set(false);
        tracing::debug!(?mode, "camera will change");
    }

    fn on_camera_did_change(&mut self, mode: CameraChangeMode) {
        tracing::info!(?mode, "camera did change");
    }

    fn on_will_start_loading_map(&mut self) {
        self.idle.set(false);
        tracing::info!("will start loading map");
    }

    fn on_did_finish_loading_map(&mut self) {
        tracing::info!("did finish loading map");
    }

    fn on_did_fail_loading_map(&mut self, error: MapLoadError, message: &str) {
        tracing::error!(%error, detail = message, "did fail loading map");
        self.idle.set(true);
    }

    fn on_did_finish_rendering_frame(&mut self, status: RenderFrameStatus) {
        tracing::trace!(?status, "frame");
    }

    fn on_will_start_rendering_map(&mut self) {
        tracing::info!("will start rendering map");
    }

    fn on_did_finish_rendering_map(&mut self, mode: RenderMode) {
        tracing::info!(?mode, "did finish rendering map");
    }

    fn on_did_finish_loading_style(&mut self) {
        tracing::info!("did finish loading style");
    }

    fn on_style_image_missing(&mut self, image_id: &str) {
        tracing::warn!(image_id, "style image missing");
    }

    fn on_did_become_idle(&mut self) {
        self.idle.set(true);
        tracing::info!("did become idle");
    }
}

/// Ticks at roughly 60 Hz until the map reports idle.
fn run_until_idle(map: &Map<HeadlessBackend>, idle: &Cell<bool>, what: &str) {
    idle.set(false);
    let mut frames = 0;
    for _ in 0..600 {
        if map.tick().expect("tick") {
            frames += 1;
        }
        if idle.get() && !map.frontend().is_dirty() {
            break;
        }
        std::thread::sleep(FRAME);
    }
    tracing::info!(what, frames, "settled");
}

fn describe_center(map: &Map<HeadlessBackend>) {
    let camera = map.camera_options().expect("camera");
    let center = camera.center.unwrap_or_default();
    tracing::info!(
        latitude = format_args!("{:.4}", center.latitude),
        longitude = format_args!("{:.4}", center.longitude),
        zoom = format_args!("{:.2}", camera.zoom.unwrap_or_default()),
        bearing = format_args!("{:.1}", camera.bearing.unwrap_or_default()),
        "camera"
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let style = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).expect("read style file"),
        None => STYLE.to_owned(),
    };

    // 1. The run loop comes first; everything below captures it.
    let run_loop = RunLoop::new().expect("no other run loop on the main thread");

    // 2. Engine, with a loader that answers from a worker thread.
    let resources = ResourceOptions::default();
    let memory = Arc::new(MemoryLoader::new());
    memory.insert(resources.resolve_url(STYLE_URL), style);
    let engine = HeadlessEngine::new(ThreadedLoader::new(memory).expect("spawn loader"));

    // 3. Backend and frontend, sized in physical pixels.
    let size = PhysicalSize::from_logical(LOGICAL_SIZE.0, LOGICAL_SIZE.1, PIXEL_RATIO);
    let backend = HeadlessBackend::new(size.width, size.height, PIXEL_RATIO).expect("backend");
    let invalidations = Rc::new(Cell::new(0_u32));
    let frontend = RendererFrontend::with_invalidate(backend, PIXEL_RATIO, {
        let invalidations = Rc::clone(&invalidations);
        move || invalidations.set(invalidations.get() + 1)
    })
    .expect("frontend");

    // 4. Observer bridge, with a fault handler for misbehaving listeners.
    let idle = Rc::new(Cell::new(false));
    let observer = ObserverBridge::new(TourObserver {
        idle: Rc::clone(&idle),
    });
    observer.set_fault_handler(|fault| tracing::error!(%fault, "listener fault"));

    // 5. The map binds all of it.
    let map = Map::new(
        &engine,
        frontend,
        observer,
        MapOptions::default()
            .with_size(size)
            .with_pixel_ratio(PIXEL_RATIO),
        resources,
        ClientOptions::new("headless_tour", env!("CARGO_PKG_VERSION")),
    )
    .expect("map");

    tracing::info!(url = STYLE_URL, "loading style");
    map.load_style_url(STYLE_URL).expect("load style");
    run_until_idle(&map, &idle, "style load");
    describe_center(&map);

    tracing::info!("easing to the Golden Gate");
    let target = CameraOptions::centered(LatLng::new(37.8199, -122.4783), 13.0).with_bearing(30.0);
    map.ease_to(&target, AnimationOptions::from_millis(400))
        .expect("ease");
    run_until_idle(&map, &idle, "ease");
    describe_center(&map);

    tracing::info!("dragging and pinching");
    map.set_gesture_in_progress(true).expect("gesture start");
    for _ in 0..10 {
        map.move_by(ScreenCoordinate::new(-12.0, 4.0)).expect("move");
        map.tick().expect("tick");
    }
    let center = ScreenCoordinate::new(LOGICAL_SIZE.0 / 2.0, LOGICAL_SIZE.1 / 2.0);
    map.scale_by(0.5, Some(center)).expect("scale");
    map.set_gesture_in_progress(false).expect("gesture end");
    run_until_idle(&map, &idle, "gesture");
    describe_center(&map);

    tracing::info!("resizing: backend first, then the map");
    let larger = PhysicalSize::from_logical(640.0, 480.0, PIXEL_RATIO);
    map.frontend().resize(larger).expect("resize backend");
    map.set_size(larger).expect("resize map");
    map.set_debug(MapDebugOptions::TILE_BORDERS | MapDebugOptions::COLLISION)
        .expect("debug");
    map.set_rendering_stats_view_enabled(true).expect("stats");
    map.trigger_repaint().expect("repaint");
    run_until_idle(&map, &idle, "resize");

    let (allocations, presents, corner) = map
        .frontend()
        .with_backend(|backend| (backend.allocations(), backend.presents(), backend.pixel(0, 0)))
        .expect("backend");
    tracing::info!(
        debug = %map.debug().expect("debug"),
        frames = map.frontend().frame_count(),
        invalidations = invalidations.get(),
        allocations,
        presents,
        ?corner,
        "summary"
    );
    let camera = map.camera_options().expect("camera");
    println!(
        "{}",
        serde_json::to_string_pretty(&camera).expect("camera serializes")
    );

    map.close();
    drop(map);
    drop(run_loop);
}
