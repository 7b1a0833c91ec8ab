// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Map events and the bridge that delivers them to host listeners.
//!
//! The engine raises events at arbitrary points, usually while the host is
//! pumping the run loop. [`ObserverBridge`] takes ownership of the host's
//! [`MapObserver`] so it stays alive exactly as long as the bridge, and
//! delivers each event synchronously and at most once.
//!
//! A panicking listener is contained: the panic is caught at the boundary,
//! logged, counted and passed to the fault handler. It never unwinds into
//! the engine, and later events are still delivered.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ListenerFault, MapLoadError};

/// How a camera change was initiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraChangeMode {
    /// Applied in one step.
    Immediate,
    /// Part of an animated transition.
    Animated,
}

/// Whether everything visible has been drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Some resources are still loading.
    Partial,
    /// Every visible resource was drawn.
    Full,
}

/// Outcome of one rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderFrameStatus {
    /// Completeness of the frame.
    pub mode: RenderMode,
    /// Another frame is needed (animation or pending content).
    pub needs_repaint: bool,
    /// Label/symbol placement changed in this frame.
    pub placement_changed: bool,
}

/// Host listener for map events.
///
/// Every method has a no-op default; implement only what you need.
#[allow(unused_variables, reason = "default no-op implementations")]
pub trait MapObserver {
    /// The camera is about to change.
    fn on_camera_will_change(&mut self, mode: CameraChangeMode) {}
    /// The camera changed during an ongoing transition or gesture.
    fn on_camera_is_changing(&mut self) {}
    /// The camera finished changing.
    fn on_camera_did_change(&mut self, mode: CameraChangeMode) {}
    /// A style load began.
    fn on_will_start_loading_map(&mut self) {}
    /// The style and every visible tile finished loading.
    fn on_did_finish_loading_map(&mut self) {}
    /// Loading the style failed.
    fn on_did_fail_loading_map(&mut self, error: MapLoadError, message: &str) {}
    /// A frame is about to be drawn.
    fn on_will_start_rendering_frame(&mut self) {}
    /// A frame was drawn.
    fn on_did_finish_rendering_frame(&mut self, status: RenderFrameStatus) {}
    /// Drawing of a newly loaded map began.
    fn on_will_start_rendering_map(&mut self) {}
    /// The map was drawn completely (or gave up at partial).
    fn on_did_finish_rendering_map(&mut self, mode: RenderMode) {}
    /// The style document was parsed and applied.
    fn on_did_finish_loading_style(&mut self) {}
    /// A layer referenced an image the style does not provide.
    fn on_style_image_missing(&mut self, image_id: &str) {}
    /// Nothing is loading, animating or waiting to be drawn.
    fn on_did_become_idle(&mut self) {}
}

/// A map event, as delivered by [`ObserverBridge::notify`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapEvent {
    /// See [`MapObserver::on_camera_will_change`].
    CameraWillChange(CameraChangeMode),
    /// See [`MapObserver::on_camera_is_changing`].
    CameraIsChanging,
    /// See [`MapObserver::on_camera_did_change`].
    CameraDidChange(CameraChangeMode),
    /// See [`MapObserver::on_will_start_loading_map`].
    WillStartLoadingMap,
    /// See [`MapObserver::on_did_finish_loading_map`].
    DidFinishLoadingMap,
    /// See [`MapObserver::on_did_fail_loading_map`].
    DidFailLoadingMap {
        /// Failure category.
        error: MapLoadError,
        /// Human-readable detail.
        message: String,
    },
    /// See [`MapObserver::on_will_start_rendering_frame`].
    WillStartRenderingFrame,
    /// See [`MapObserver::on_did_finish_rendering_frame`].
    DidFinishRenderingFrame(RenderFrameStatus),
    /// See [`MapObserver::on_will_start_rendering_map`].
    WillStartRenderingMap,
    /// See [`MapObserver::on_did_finish_rendering_map`].
    DidFinishRenderingMap(RenderMode),
    /// See [`MapObserver::on_did_finish_loading_style`].
    DidFinishLoadingStyle,
    /// See [`MapObserver::on_style_image_missing`].
    StyleImageMissing(String),
    /// See [`MapObserver::on_did_become_idle`].
    DidBecomeIdle,
}

impl MapEvent {
    /// Stable event name, used in logs and fault reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CameraWillChange(_) => "camera_will_change",
            Self::CameraIsChanging => "camera_is_changing",
            Self::CameraDidChange(_) => "camera_did_change",
            Self::WillStartLoadingMap => "will_start_loading_map",
            Self::DidFinishLoadingMap => "did_finish_loading_map",
            Self::DidFailLoadingMap { .. } => "did_fail_loading_map",
            Self::WillStartRenderingFrame => "will_start_rendering_frame",
            Self::DidFinishRenderingFrame(_) => "did_finish_rendering_frame",
            Self::WillStartRenderingMap => "will_start_rendering_map",
            Self::DidFinishRenderingMap(_) => "did_finish_rendering_map",
            Self::DidFinishLoadingStyle => "did_finish_loading_style",
            Self::StyleImageMissing(_) => "style_image_missing",
            Self::DidBecomeIdle => "did_become_idle",
        }
    }

    /// Calls the matching method on `observer`.
    pub fn dispatch(&self, observer: &mut dyn MapObserver) {
        match self {
            Self::CameraWillChange(mode) => observer.on_camera_will_change(*mode),
            Self::CameraIsChanging => observer.on_camera_is_changing(),
            Self::CameraDidChange(mode) => observer.on_camera_did_change(*mode),
            Self::WillStartLoadingMap => observer.on_will_start_loading_map(),
            Self::DidFinishLoadingMap => observer.on_did_finish_loading_map(),
            Self::DidFailLoadingMap { error, message } => {
                observer.on_did_fail_loading_map(*error, message);
            }
            Self::WillStartRenderingFrame => observer.on_will_start_rendering_frame(),
            Self::DidFinishRenderingFrame(status) => {
                observer.on_did_finish_rendering_frame(*status);
            }
            Self::WillStartRenderingMap => observer.on_will_start_rendering_map(),
            Self::DidFinishRenderingMap(mode) => observer.on_did_finish_rendering_map(*mode),
            Self::DidFinishLoadingStyle => observer.on_did_finish_loading_style(),
            Self::StyleImageMissing(id) => observer.on_style_image_missing(id),
            Self::DidBecomeIdle => observer.on_did_become_idle(),
        }
    }
}

/// Receives render events from the
/// [`RendererFrontend`](crate::frontend::RendererFrontend).
///
/// The engine's map implements this and turns the calls into [`MapEvent`]s.
#[allow(unused_variables, reason = "default no-op implementations")]
pub trait RendererObserver {
    /// A frame is about to be drawn.
    fn on_will_start_rendering_frame(&self) {}
    /// A frame was drawn.
    fn on_did_finish_rendering_frame(&self, status: RenderFrameStatus) {}
    /// Drawing of a newly loaded map began.
    fn on_will_start_rendering_map(&self) {}
    /// The map was drawn completely (or gave up at partial).
    fn on_did_finish_rendering_map(&self, mode: RenderMode) {}
}

struct NoopObserver;

impl MapObserver for NoopObserver {}

type FaultHandler = Box<dyn Fn(&ListenerFault)>;

struct BridgeInner {
    listener: RefCell<Box<dyn MapObserver>>,
    pending: RefCell<VecDeque<MapEvent>>,
    on_fault: RefCell<Option<FaultHandler>>,
    delivered: Cell<u64>,
    faults: Cell<u64>,
}

/// Owns a host [`MapObserver`] and delivers events to it safely.
///
/// Clones share one bridge. The listener is dropped when the last clone is.
///
/// Events raised while the listener is already running (for example, a
/// listener that moves the camera from inside `on_did_finish_loading_style`)
/// are queued and delivered in order as soon as the running callback returns.
#[derive(Clone)]
pub struct ObserverBridge {
    inner: Rc<BridgeInner>,
}

impl fmt::Debug for ObserverBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBridge")
            .field("delivered", &self.inner.delivered.get())
            .field("faults", &self.inner.faults.get())
            .finish_non_exhaustive()
    }
}

impl ObserverBridge {
    /// Takes ownership of `listener`.
    pub fn new(listener: impl MapObserver + 'static) -> Self {
        Self::from_boxed(Box::new(listener))
    }

    /// Takes ownership of an already boxed listener.
    #[must_use]
    pub fn from_boxed(listener: Box<dyn MapObserver>) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                listener: RefCell::new(listener),
                pending: RefCell::new(VecDeque::new()),
                on_fault: RefCell::new(None),
                delivered: Cell::new(0),
                faults: Cell::new(0),
            }),
        }
    }

    /// A bridge that discards every event.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(NoopObserver)
    }

    /// Installs a handler that receives every caught listener fault.
    pub fn set_fault_handler(&self, handler: impl Fn(&ListenerFault) + 'static) {
        *self.inner.on_fault.borrow_mut() = Some(Box::new(handler));
    }

    /// Delivers `event` to the listener.
    pub fn notify(&self, event: MapEvent) {
        self.inner.pending.borrow_mut().push_back(event);
        let Ok(mut listener) = self.inner.listener.try_borrow_mut() else {
            // Re-entrant: the outer delivery loop picks it up.
            return;
        };
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };
            let result = catch_unwind(AssertUnwindSafe(|| event.dispatch(&mut **listener)));
            match result {
                Ok(()) => self.inner.delivered.set(self.inner.delivered.get() + 1),
                Err(payload) => self.fault(event.name(), payload.as_ref()),
            }
        }
    }

    /// Number of events the listener handled without panicking.
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.inner.delivered.get()
    }

    /// Number of events whose listener call panicked.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.inner.faults.get()
    }

    fn fault(&self, event: &'static str, payload: &(dyn Any + Send)) {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("non-string panic payload")
        };
        let fault = ListenerFault { event, message };
        self.inner.faults.set(self.inner.faults.get() + 1);
        tracing::error!(event, message = %fault.message, "map listener panicked");
        if let Some(handler) = self.inner.on_fault.borrow().as_ref() {
            handler(&fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<&'static str>>>);

    impl MapObserver for Log {
        fn on_will_start_loading_map(&mut self) {
            self.0.borrow_mut().push("will_start");
        }

        fn on_did_finish_loading_style(&mut self) {
            self.0.borrow_mut().push("style");
        }

        fn on_did_become_idle(&mut self) {
            panic!("listener bug");
        }
    }

    #[test]
    fn events_reach_listener_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let bridge = ObserverBridge::new(Log(Rc::clone(&log)));
        bridge.notify(MapEvent::WillStartLoadingMap);
        bridge.notify(MapEvent::DidFinishLoadingStyle);
        bridge.notify(MapEvent::CameraIsChanging);
        assert_eq!(*log.borrow(), ["will_start", "style"], "delivery order");
        assert_eq!(bridge.delivered_count(), 3, "defaults count as delivered");
    }

    #[test]
    fn panicking_listener_is_contained() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let bridge = ObserverBridge::new(Log(Rc::clone(&log)));
        let faults = Rc::new(RefCell::new(Vec::new()));
        let f = Rc::clone(&faults);
        bridge.set_fault_handler(move |fault| f.borrow_mut().push(fault.clone()));

        bridge.notify(MapEvent::DidBecomeIdle);
        bridge.notify(MapEvent::WillStartLoadingMap);

        assert_eq!(bridge.fault_count(), 1, "one fault recorded");
        assert_eq!(
            *faults.borrow(),
            [ListenerFault {
                event: "did_become_idle",
                message: "listener bug".into()
            }],
            "fault handler sees the panic message"
        );
        assert_eq!(*log.borrow(), ["will_start"], "later events still arrive");
    }

    struct Reentrant {
        bridge: Rc<RefCell<Option<ObserverBridge>>>,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl MapObserver for Reentrant {
        fn on_did_finish_loading_style(&mut self) {
            self.seen.borrow_mut().push("style".into());
            if let Some(bridge) = self.bridge.borrow().as_ref() {
                bridge.notify(MapEvent::CameraWillChange(CameraChangeMode::Immediate));
            }
            self.seen.borrow_mut().push("style-done".into());
        }

        fn on_camera_will_change(&mut self, _mode: CameraChangeMode) {
            self.seen.borrow_mut().push("camera".into());
        }
    }

    #[test]
    fn reentrant_events_are_deferred_not_dropped() {
        let slot = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bridge = ObserverBridge::new(Reentrant {
            bridge: Rc::clone(&slot),
            seen: Rc::clone(&seen),
        });
        *slot.borrow_mut() = Some(bridge.clone());

        bridge.notify(MapEvent::DidFinishLoadingStyle);
        assert_eq!(
            *seen.borrow(),
            ["style", "style-done", "camera"],
            "nested event delivered after the running callback"
        );
        slot.borrow_mut().take();
    }

    #[test]
    fn event_names_are_stable() {
        let e = MapEvent::DidFailLoadingMap {
            error: MapLoadError::NotFoundError,
            message: "missing".into(),
        };
        assert_eq!(e.name(), "did_fail_loading_map", "name");
    }
}
