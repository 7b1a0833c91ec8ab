// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`MapObserver`] that records every event.

use std::cell::RefCell;
use std::rc::Rc;

use mapbridge_core::error::MapLoadError;
use mapbridge_core::observer::{
    CameraChangeMode, MapEvent, MapObserver, RenderFrameStatus, RenderMode,
};

/// Shared view of the events a [`RecordingObserver`] has seen.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Rc<RefCell<Vec<MapEvent>>>);

impl EventLog {
    /// All events so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<MapEvent> {
        self.0.borrow().clone()
    }

    /// Event names so far, in delivery order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.0.borrow().iter().map(MapEvent::name).collect()
    }

    /// How many events named `name` were seen.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.name() == name).count()
    }

    /// Index of the first event named `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e.name() == name)
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, event: MapEvent) {
        self.0.borrow_mut().push(event);
    }
}

/// Appends every event to an [`EventLog`].
#[derive(Debug)]
pub struct RecordingObserver {
    log: EventLog,
}

impl RecordingObserver {
    /// A recorder and the log it writes to.
    #[must_use]
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl MapObserver for RecordingObserver {
    fn on_camera_will_change(&mut self, mode: CameraChangeMode) {
        self.log.push(MapEvent::CameraWillChange(mode));
    }

    fn on_camera_is_changing(&mut self) {
        self.log.push(MapEvent::CameraIsChanging);
    }

    fn on_camera_did_change(&mut self, mode: CameraChangeMode) {
        self.log.push(MapEvent::CameraDidChange(mode));
    }

    fn on_will_start_loading_map(&mut self) {
        self.log.push(MapEvent::WillStartLoadingMap);
    }

    fn on_did_finish_loading_map(&mut self) {
        self.log.push(MapEvent::DidFinishLoadingMap);
    }

    fn on_did_fail_loading_map(&mut self, error: MapLoadError, message: &str) {
        self.log.push(MapEvent::DidFailLoadingMap {
            error,
            message: message.to_owned(),
        });
    }

    fn on_will_start_rendering_frame(&mut self) {
        self.log.push(MapEvent::WillStartRenderingFrame);
    }

    fn on_did_finish_rendering_frame(&mut self, status: RenderFrameStatus) {
        self.log.push(MapEvent::DidFinishRenderingFrame(status));
    }

    fn on_will_start_rendering_map(&mut self) {
        self.log.push(MapEvent::WillStartRenderingMap);
    }

    fn on_did_finish_rendering_map(&mut self, mode: RenderMode) {
        self.log.push(MapEvent::DidFinishRenderingMap(mode));
    }

    fn on_did_finish_loading_style(&mut self) {
        self.log.push(MapEvent::DidFinishLoadingStyle);
    }

    fn on_style_image_missing(&mut self, image_id: &str) {
        self.log.push(MapEvent::StyleImageMissing(image_id.to_owned()));
    }

    fn on_did_become_idle(&mut self) {
        self.log.push(MapEvent::DidBecomeIdle);
    }
}

#[cfg(test)]
mod tests {
    use mapbridge_core::observer::ObserverBridge;

    use super::*;

    #[test]
    fn records_through_a_bridge() {
        let (recorder, log) = RecordingObserver::new();
        let bridge = ObserverBridge::new(recorder);
        bridge.notify(MapEvent::WillStartLoadingMap);
        bridge.notify(MapEvent::StyleImageMissing("pin".into()));
        assert_eq!(
            log.names(),
            ["will_start_loading_map", "style_image_missing"],
            "order kept"
        );
        assert_eq!(log.count("style_image_missing"), 1, "one miss");
        assert_eq!(log.position("style_image_missing"), Some(1), "second");
        log.clear();
        assert!(log.is_empty(), "cleared");
    }
}
