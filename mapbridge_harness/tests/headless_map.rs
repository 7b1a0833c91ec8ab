// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end scenarios: a [`Map`] driven by the headless engine through a
//! real run loop, frontend and offscreen backend.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mapbridge_core::error::{LifecycleError, MapLoadError};
use mapbridge_core::observer::{CameraChangeMode, MapEvent, MapObserver, ObserverBridge, RenderMode};
use mapbridge_core::options::{ClientOptions, MapOptions, ResourceOptions};
use mapbridge_core::run_loop::RunLoop;
use mapbridge_core::surface::PhysicalSize;
use mapbridge_core::{
    AnimationOptions, CameraOptions, Error, LatLng, Map, MapDebugOptions, RendererFrontend,
    ScreenCoordinate,
};
use mapbridge_harness::{
    EventLog, HeadlessBackend, HeadlessEngine, LoadError, ManualClock, MemoryLoader,
    RecordingObserver, Rgba8, ThreadedLoader,
};

const STYLE_URL: &str = "https://tiles.example.test/style.json";

const STYLE: &str = r##"{
    "version": 8,
    "name": "Basic",
    "center": [13.4, 52.5],
    "zoom": 9,
    "sources": {"streets": {"type": "vector"}, "terrain": {"type": "raster-dem"}},
    "layers": [
        {"id": "bg", "type": "background", "paint": {"background-color": "#204060"}}
    ]
}"##;

const OTHER_STYLE: &str = r#"{
    "version": 8,
    "name": "Other",
    "center": [-74.0, 40.7],
    "zoom": 4,
    "sources": {},
    "layers": []
}"#;

// Fields drop in order: the map goes before the loop it runs on.
struct Fixture {
    map: Map<HeadlessBackend>,
    log: EventLog,
    loader: Arc<MemoryLoader>,
    clock: ManualClock,
    run_loop: RunLoop,
}

impl Fixture {
    fn new() -> Self {
        let (recorder, log) = RecordingObserver::new();
        Self::with_observer(ObserverBridge::new(recorder), log)
    }

    fn with_observer(observer: ObserverBridge, log: EventLog) -> Self {
        let run_loop = RunLoop::new().unwrap();
        let loader = Arc::new(MemoryLoader::new());
        loader.insert(STYLE_URL, STYLE);
        let clock = ManualClock::new();
        let engine = HeadlessEngine::new(Arc::clone(&loader)).with_clock(clock.clone());
        let size = PhysicalSize::new(400, 300);
        let backend = HeadlessBackend::new(size.width, size.height, 1.0).unwrap();
        let frontend = RendererFrontend::new(backend, 1.0).unwrap();
        let map = Map::new(
            &engine,
            frontend,
            observer,
            MapOptions::default().with_size(size),
            ResourceOptions::default(),
            ClientOptions::default(),
        )
        .unwrap();
        Self {
            map,
            log,
            loader,
            clock,
            run_loop,
        }
    }

    /// Ticks until nothing is queued and nothing is dirty.
    fn settle(&self) {
        for _ in 0..32 {
            let drew = self.map.tick().unwrap();
            if !drew && self.run_loop.pending() == 0 && !self.map.frontend().is_dirty() {
                return;
            }
        }
        panic!("map did not settle: {:?}", self.log.names());
    }

    fn load_and_settle(&self) {
        self.map.load_style_url(STYLE_URL).unwrap();
        self.settle();
    }
}

#[test]
fn style_load_reports_in_order() {
    let fx = Fixture::new();
    fx.load_and_settle();

    let order = [
        "will_start_loading_map",
        "did_finish_loading_style",
        "will_start_rendering_map",
        "did_finish_rendering_map",
        "did_finish_loading_map",
        "did_become_idle",
    ];
    let positions: Vec<_> = order.iter().map(|name| fx.log.position(name)).collect();
    assert!(positions.iter().all(Option::is_some), "{:?}", fx.log.names());
    assert!(positions.is_sorted(), "out of order: {:?}", fx.log.names());
    assert!(
        fx.log
            .events()
            .contains(&MapEvent::DidFinishRenderingMap(RenderMode::Full)),
        "full map frame"
    );
    assert_eq!(fx.loader.request_count(), 1, "one fetch");
}

#[test]
fn finish_is_reported_once() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.map.trigger_repaint().unwrap();
    fx.settle();
    assert_eq!(fx.log.count("did_finish_loading_map"), 1, "one finish");
    assert_eq!(fx.log.count("did_fail_loading_map"), 0, "no failure");
    assert_eq!(fx.log.count("did_become_idle"), 1, "idle once");
}

#[test]
fn style_defaults_apply_and_frame_uses_background() {
    let fx = Fixture::new();
    fx.load_and_settle();
    let camera = fx.map.camera_options().unwrap();
    assert_eq!(camera.zoom, Some(9.0), "style zoom");
    let center = camera.center.unwrap();
    assert!((center.latitude - 52.5).abs() < 1e-9, "style center {center:?}");
    let px = fx
        .map
        .frontend()
        .with_backend(|b| b.pixel(10, 10))
        .unwrap();
    assert_eq!(px, Some(Rgba8::new(0x20, 0x40, 0x60, 255)), "background drawn");
}

#[test]
fn load_failures_are_classified() {
    let fx = Fixture::new();
    fx.loader.insert_error(
        "https://tiles.example.test/broken.json",
        LoadError::Transport("connection reset".into()),
    );
    let cases = [
        (None, MapLoadError::StyleParseError),
        (Some("https://tiles.example.test/missing.json"), MapLoadError::NotFoundError),
        (Some("https://tiles.example.test/broken.json"), MapLoadError::StyleLoadError),
    ];
    for (url, expected) in cases {
        fx.log.clear();
        match url {
            Some(url) => fx.map.load_style_url(url).unwrap(),
            None => fx.map.load_style_json("{ not json").unwrap(),
        }
        fx.settle();
        let failures: Vec<_> = fx
            .log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MapEvent::DidFailLoadingMap { error, .. } => Some(error),
                _ => None,
            })
            .collect();
        assert_eq!(failures, [expected], "{url:?}");
        assert_eq!(fx.log.count("did_finish_loading_map"), 0, "no finish after failure");
    }
}

#[test]
fn failed_reload_never_finishes_or_goes_idle() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.log.clear();

    fx.map.load_style_json("{ broken").unwrap();
    fx.settle();
    fx.map
        .jump_to(&CameraOptions::default().with_zoom(3.0))
        .unwrap();
    fx.settle();

    let failed = fx.log.position("did_fail_loading_map");
    assert!(failed.is_some(), "failure reported: {:?}", fx.log.names());
    assert_eq!(fx.log.count("did_finish_loading_map"), 0, "{:?}", fx.log.names());
    assert_eq!(fx.log.count("did_become_idle"), 0, "{:?}", fx.log.names());
    let px = fx
        .map
        .frontend()
        .with_backend(|b| b.pixel(10, 10))
        .unwrap();
    assert_eq!(px, Some(Rgba8::new(0x20, 0x40, 0x60, 255)), "old style still drawn");

    fx.map.load_style_json(OTHER_STYLE).unwrap();
    fx.settle();
    assert_eq!(fx.log.count("did_finish_loading_map"), 1, "next load finishes");
    assert_eq!(fx.log.count("did_become_idle"), 1, "and goes idle");
}

#[test]
fn superseded_load_is_discarded() {
    let fx = Fixture::new();
    fx.map.load_style_json(STYLE).unwrap();
    fx.map.load_style_json(OTHER_STYLE).unwrap();
    fx.settle();
    assert_eq!(fx.log.count("will_start_loading_map"), 2, "two loads started");
    assert_eq!(fx.log.count("did_finish_loading_style"), 1, "one style applied");
    assert_eq!(fx.log.count("did_finish_loading_map"), 1, "one finish");
    assert_eq!(fx.map.camera_options().unwrap().zoom, Some(4.0), "second style wins");
}

#[test]
fn host_camera_beats_style_defaults() {
    let fx = Fixture::new();
    fx.map.load_style_url(STYLE_URL).unwrap();
    fx.map
        .jump_to(&CameraOptions::centered(LatLng::new(1.0, 2.0), 3.0))
        .unwrap();
    fx.settle();
    assert_eq!(fx.map.camera_options().unwrap().zoom, Some(3.0), "host zoom kept");
    assert_eq!(fx.log.count("did_finish_loading_map"), 1, "still loads");
}

#[test]
fn missing_images_are_reported() {
    let fx = Fixture::new();
    fx.map
        .load_style_json(
            r#"{"version": 8, "sources": {}, "images": ["pin"],
                "layers": [{"id": "poi", "type": "symbol", "layout": {"icon-image": "cafe"}}]}"#,
        )
        .unwrap();
    fx.settle();
    assert!(
        fx.log
            .events()
            .contains(&MapEvent::StyleImageMissing("cafe".into())),
        "{:?}",
        fx.log.names()
    );
    assert!(
        fx.log.position("style_image_missing") > fx.log.position("did_finish_loading_style"),
        "after the style"
    );
}

#[test]
fn gesture_marks_dirty_and_next_tick_draws() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.log.clear();
    let frames = fx.map.frontend().frame_count();
    let before = fx.map.camera_options().unwrap().center.unwrap();

    fx.map.set_gesture_in_progress(true).unwrap();
    fx.map.move_by(ScreenCoordinate::new(40.0, 0.0)).unwrap();
    assert!(fx.map.frontend().is_dirty(), "gesture prepared a frame");
    assert_eq!(
        fx.log.names(),
        ["camera_will_change", "camera_is_changing", "camera_did_change"],
        "gesture events"
    );
    assert!(fx.map.tick().unwrap(), "drawn on next tick");
    assert_eq!(fx.map.frontend().frame_count(), frames + 1, "one frame");
    let after = fx.map.camera_options().unwrap().center.unwrap();
    assert!(after.longitude < before.longitude, "dragging right pans west");
    assert!(fx.map.is_gesture_in_progress().unwrap(), "gesture flag kept");
}

#[test]
fn idle_waits_for_the_gesture_to_end() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.log.clear();

    fx.map.set_gesture_in_progress(true).unwrap();
    fx.map.scale_by(2.0, None).unwrap();
    fx.settle();
    assert_eq!(fx.log.count("did_become_idle"), 0, "busy while gesturing");

    fx.map.set_gesture_in_progress(false).unwrap();
    assert!(fx.map.frontend().is_dirty(), "gesture end prepares a frame");
    fx.settle();
    assert_eq!(fx.log.count("did_become_idle"), 1, "idle after the gesture");
}

#[test]
fn ease_steps_with_the_clock() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.log.clear();
    fx.map
        .ease_to(
            &CameraOptions::default().with_zoom(11.0),
            AnimationOptions::from_millis(300),
        )
        .unwrap();
    assert_eq!(
        fx.log.events(),
        [MapEvent::CameraWillChange(CameraChangeMode::Animated)],
        "animation announced"
    );

    assert!(fx.map.tick().unwrap(), "first animated frame");
    fx.clock.advance_ms(150);
    assert!(fx.map.tick().unwrap(), "mid frame");
    let zoom = fx.map.camera_options().unwrap().zoom.unwrap();
    assert!(zoom > 9.0 && zoom < 11.0, "in flight at {zoom}");
    assert!(fx.log.count("camera_is_changing") >= 2, "steps reported");

    fx.clock.advance(Duration::from_millis(200));
    fx.settle();
    assert_eq!(fx.map.camera_options().unwrap().zoom, Some(11.0), "arrived");
    assert_eq!(
        fx.log
            .events()
            .iter()
            .filter(|e| **e == MapEvent::CameraDidChange(CameraChangeMode::Animated))
            .count(),
        1,
        "one completion"
    );
    assert_eq!(fx.log.count("did_become_idle"), 1, "idle after arrival");
}

#[test]
fn zero_duration_ease_is_a_jump() {
    let fx = Fixture::new();
    fx.map
        .ease_to(
            &CameraOptions::default().with_zoom(5.0),
            AnimationOptions::from_millis(0),
        )
        .unwrap();
    assert_eq!(fx.map.camera_options().unwrap().zoom, Some(5.0), "applied now");
    assert!(
        fx.log
            .events()
            .contains(&MapEvent::CameraDidChange(CameraChangeMode::Immediate)),
        "immediate change"
    );
}

#[test]
fn identical_resize_allocates_once() {
    let fx = Fixture::new();
    let size = PhysicalSize::new(800, 600);
    fx.map.frontend().resize(size).unwrap();
    fx.map.frontend().resize(size).unwrap();
    fx.map.set_size(size).unwrap();
    fx.settle();
    let allocations = fx
        .map
        .frontend()
        .with_backend(|b| b.allocations())
        .unwrap();
    assert_eq!(allocations, 2, "initial plus one resize");
    assert_eq!(fx.map.size().unwrap(), size, "engine size follows");
}

#[test]
fn debug_overlays_reach_the_frame() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.map.set_debug(MapDebugOptions::COLLISION).unwrap();
    fx.map.set_rendering_stats_view_enabled(true).unwrap();
    fx.settle();
    assert_eq!(fx.map.debug().unwrap(), MapDebugOptions::COLLISION, "round trip");
    let tinted = fx
        .map
        .frontend()
        .with_backend(|b| b.pixel(300, 200))
        .unwrap()
        .unwrap();
    assert!(tinted.r > 0x20, "collision tint visible: {tinted:?}");
}

#[test]
fn panicking_listener_does_not_stop_delivery() {
    struct Fragile(Rc<RefCell<Vec<&'static str>>>);

    impl MapObserver for Fragile {
        fn on_did_finish_loading_style(&mut self) {
            panic!("listener bug");
        }

        fn on_did_finish_loading_map(&mut self) {
            self.0.borrow_mut().push("did_finish_loading_map");
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let bridge = ObserverBridge::new(Fragile(Rc::clone(&seen)));
    let fx = Fixture::with_observer(bridge, EventLog::default());
    fx.load_and_settle();
    assert_eq!(fx.map.observer().fault_count(), 1, "fault contained");
    assert_eq!(*seen.borrow(), ["did_finish_loading_map"], "later events delivered");
}

#[test]
fn closed_map_stops_rendering() {
    let fx = Fixture::new();
    fx.load_and_settle();
    fx.map.close();
    fx.map.close();
    assert!(fx.map.is_closed(), "closed");
    assert_eq!(fx.map.frontend().render(), Ok(false), "nothing left to draw");
    assert!(
        matches!(
            fx.map.jump_to(&CameraOptions::default().with_zoom(1.0)),
            Err(Error::Lifecycle(LifecycleError::UseAfterFree { .. }))
        ),
        "use after close"
    );
}

#[test]
fn threaded_loader_answers_through_the_run_loop() {
    let run_loop = RunLoop::new().unwrap();
    let memory = Arc::new(MemoryLoader::new());
    memory.insert(STYLE_URL, STYLE);
    let engine = HeadlessEngine::new(ThreadedLoader::new(memory).unwrap());
    let (recorder, log) = RecordingObserver::new();
    let frontend =
        RendererFrontend::new(HeadlessBackend::new(64, 64, 1.0).unwrap(), 1.0).unwrap();
    let map = Map::new(
        &engine,
        frontend,
        ObserverBridge::new(recorder),
        MapOptions::default(),
        ResourceOptions::default(),
        ClientOptions::default(),
    )
    .unwrap();
    map.load_style_url(STYLE_URL).unwrap();
    for _ in 0..500 {
        map.tick().unwrap();
        if log.count("did_become_idle") > 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(log.count("did_finish_loading_map"), 1, "{:?}", log.names());
    drop(map);
    drop(run_loop);
}
