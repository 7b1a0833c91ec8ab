// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderer frontend: dirty tracking and frame submission.
//!
//! The frontend sits between the engine's map, which prepares frames, and a
//! [`RendererBackend`], which shows them. It keeps one piece of state that
//! matters to the host, the dirty flag:
//!
//! ```text
//!   NativeMap ──update(params)──► RendererFrontend ──render()──► NativeRenderer
//!                                   │  dirty = true                   │
//!                                   ▼                                 ▼
//!                             on_invalidate()                RendererBackend::swap()
//! ```
//!
//! The host either calls [`tick`](RendererFrontend::tick) on a timer, or waits
//! for `on_invalidate` and then ticks. `tick` pumps the thread's run loop and
//! renders only when something changed.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::num::NonZeroU64;
use std::rc::{Rc, Weak};

use crate::backend::RendererBackend;
use crate::engine::{FrameParams, NativeRenderer, RenderReport};
use crate::error::{ConstructionError, Error, LifecycleError, RenderError, SurfaceError};
use crate::handle::{NativeHandle, NativeRef};
use crate::observer::RendererObserver;
use crate::run_loop::Scheduler;
use crate::surface::PhysicalSize;

/// Identifies one set of [`FrameParams`] handed to the frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameParamsId(NonZeroU64);

impl FrameParamsId {
    /// Raw value, for diagnostics.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// Ties a bound renderer to whoever bound it.
///
/// Returned by [`RendererFrontend::bind_renderer`]; a later bind supersedes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererBinding(u64);

struct RenderState {
    dirty: bool,
    latest_frame_params_id: Option<FrameParamsId>,
    params: Option<FrameParams>,
    issued: u64,
}

struct Shared<B> {
    backend: NativeHandle<RefCell<B>>,
    state: RefCell<RenderState>,
    pixel_ratio: f32,
    renderer: RefCell<Option<Box<dyn NativeRenderer>>>,
    bindings: Cell<u64>,
    observer: RefCell<Option<Weak<dyn RendererObserver>>>,
    on_invalidate: Option<Box<dyn Fn()>>,
    scheduler: Scheduler,
    rendering: Cell<bool>,
    frames: Cell<u64>,
}

impl<B: RendererBackend> Shared<B> {
    fn reentrant(&self) -> LifecycleError {
        LifecycleError::Reentrant {
            reference: self.backend.reference(),
        }
    }

    fn mark_dirty(&self) {
        self.state.borrow_mut().dirty = true;
        if let Some(on_invalidate) = &self.on_invalidate {
            on_invalidate();
        }
    }

    fn update(&self, params: FrameParams) {
        {
            let mut state = self.state.borrow_mut();
            state.issued += 1;
            state.latest_frame_params_id = NonZeroU64::new(state.issued).map(FrameParamsId);
            state.params = Some(params);
        }
        self.mark_dirty();
    }

    fn observer(&self) -> Option<Rc<dyn RendererObserver>> {
        self.observer.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn draw(&self, backend: &RefCell<B>, params: &FrameParams) -> Result<RenderReport, Error> {
        let mut backend = backend.try_borrow_mut().map_err(|_| self.reentrant())?;
        let mut renderer = self.renderer.try_borrow_mut().map_err(|_| self.reentrant())?;
        let renderer = renderer
            .as_mut()
            .ok_or_else(|| RenderError::Renderer("no renderer bound".into()))?;

        backend.activate().map_err(RenderError::from)?;
        let drawn = renderer.render(&mut *backend, params);
        let presented = match &drawn {
            Ok(_) if !backend.presents_implicitly() => backend.swap(),
            _ => Ok(()),
        };
        backend.deactivate();

        let report = drawn?;
        presented.map_err(RenderError::from)?;
        Ok(report)
    }
}

trait UpdateTarget {
    fn update(&self, params: FrameParams);
    fn mark_dirty(&self);
}

impl<B: RendererBackend> UpdateTarget for Shared<B> {
    fn update(&self, params: FrameParams) {
        Self::update(self, params);
    }

    fn mark_dirty(&self) {
        Self::mark_dirty(self);
    }
}

struct Detached;

impl UpdateTarget for Detached {
    fn update(&self, _params: FrameParams) {}
    fn mark_dirty(&self) {}
}

/// The engine's way back into a [`RendererFrontend`].
///
/// Does not keep the frontend alive; calls after the frontend is dropped
/// return `false` and do nothing.
#[derive(Clone)]
pub struct UpdateSink {
    target: Weak<dyn UpdateTarget>,
}

impl fmt::Debug for UpdateSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSink")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl UpdateSink {
    /// A sink connected to nothing, for engines driven without a frontend.
    #[must_use]
    pub fn detached() -> Self {
        let target: Weak<dyn UpdateTarget> = Weak::<Detached>::new();
        Self { target }
    }

    /// Hands new frame parameters to the frontend and marks it dirty.
    pub fn update(&self, params: FrameParams) -> bool {
        self.target.upgrade().map(|t| t.update(params)).is_some()
    }

    /// Marks the frontend dirty without new parameters.
    pub fn mark_dirty(&self) -> bool {
        self.target.upgrade().map(|t| t.mark_dirty()).is_some()
    }

    /// Returns whether the frontend still exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// Owns a backend and decides when to draw into it.
///
/// A frontend is bound to one backend for its whole life; to change backends,
/// create a new frontend. Clones share the same frontend. It must be created
/// on a thread with a [`RunLoop`](crate::run_loop::RunLoop), and is used only
/// from that thread.
pub struct RendererFrontend<B: RendererBackend> {
    shared: Rc<Shared<B>>,
}

impl<B: RendererBackend> Clone for RendererFrontend<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<B: RendererBackend> fmt::Debug for RendererFrontend<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("RendererFrontend")
            .field("backend", &self.shared.backend.reference())
            .field("dirty", &state.dirty)
            .field("latest_frame_params_id", &state.latest_frame_params_id)
            .field("pixel_ratio", &self.shared.pixel_ratio)
            .finish_non_exhaustive()
    }
}

impl<B: RendererBackend> RendererFrontend<B> {
    /// Binds a frontend to `backend`.
    ///
    /// # Errors
    ///
    /// - [`ConstructionError::NoRunLoop`] without a run loop on this thread.
    /// - [`ConstructionError::Surface`] for a non-positive pixel ratio.
    pub fn new(backend: B, pixel_ratio: f32) -> Result<Self, ConstructionError> {
        Self::build(backend, pixel_ratio, None)
    }

    /// Like [`new`](Self::new), and calls `on_invalidate` every time the
    /// frontend becomes dirty so the host can schedule a
    /// [`tick`](Self::tick).
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn with_invalidate(
        backend: B,
        pixel_ratio: f32,
        on_invalidate: impl Fn() + 'static,
    ) -> Result<Self, ConstructionError> {
        Self::build(backend, pixel_ratio, Some(Box::new(on_invalidate)))
    }

    fn build(
        backend: B,
        pixel_ratio: f32,
        on_invalidate: Option<Box<dyn Fn()>>,
    ) -> Result<Self, ConstructionError> {
        let scheduler = Scheduler::current().ok_or(ConstructionError::NoRunLoop)?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(SurfaceError::InvalidPixelRatio(pixel_ratio).into());
        }
        let backend = NativeHandle::new(|| RefCell::new(backend));
        tracing::debug!(backend = %backend.reference(), pixel_ratio, "renderer frontend created");
        Ok(Self {
            shared: Rc::new(Shared {
                backend,
                state: RefCell::new(RenderState {
                    dirty: false,
                    latest_frame_params_id: None,
                    params: None,
                    issued: 0,
                }),
                pixel_ratio,
                renderer: RefCell::new(None),
                bindings: Cell::new(0),
                observer: RefCell::new(None),
                on_invalidate,
                scheduler,
                rendering: Cell::new(false),
                frames: Cell::new(0),
            }),
        })
    }

    /// Reference of the owned backend.
    #[must_use]
    pub fn reference(&self) -> NativeRef {
        self.shared.backend.reference()
    }

    /// Pixel ratio the frontend was created with.
    #[must_use]
    pub fn pixel_ratio(&self) -> f32 {
        self.shared.pixel_ratio
    }

    /// Returns whether a render is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.state.borrow().dirty
    }

    /// Id of the most recent frame parameters, or `None` if the engine never
    /// prepared a frame.
    #[must_use]
    pub fn latest_frame_params_id(&self) -> Option<FrameParamsId> {
        self.shared.state.borrow().latest_frame_params_id
    }

    /// Number of frames drawn so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.shared.frames.get()
    }

    /// A sink the engine uses to deliver frames.
    #[must_use]
    pub fn update_sink(&self) -> UpdateSink {
        let target: Rc<dyn UpdateTarget> = self.shared.clone();
        UpdateSink {
            target: Rc::downgrade(&target),
        }
    }

    /// Stores new frame parameters and marks the frontend dirty.
    pub fn update(&self, params: FrameParams) {
        self.shared.update(params);
    }

    /// Requests a render and notifies the host through `on_invalidate`.
    pub fn mark_dirty(&self) {
        self.shared.mark_dirty();
    }

    /// Installs the renderer that draws this frontend's frames, replacing any
    /// earlier one.
    pub fn bind_renderer(&self, renderer: Box<dyn NativeRenderer>) -> RendererBinding {
        *self.shared.renderer.borrow_mut() = Some(renderer);
        let binding = self.shared.bindings.get() + 1;
        self.shared.bindings.set(binding);
        RendererBinding(binding)
    }

    /// [`reset`](Self::reset)s the frontend if `binding` is still the bound
    /// renderer. Returns `false` and leaves the frontend alone once something
    /// else has bound since.
    pub fn unbind(&self, binding: RendererBinding) -> bool {
        if self.shared.bindings.get() != binding.0 {
            return false;
        }
        self.reset();
        true
    }

    /// Routes render events to `observer`. The frontend does not keep it alive.
    pub fn set_observer(&self, observer: &Rc<dyn RendererObserver>) {
        *self.shared.observer.borrow_mut() = Some(Rc::downgrade(observer));
    }

    /// Drops the renderer and forgets prepared frames.
    ///
    /// Nothing is drawn again until a map binds a new renderer.
    pub fn reset(&self) {
        if let Ok(mut renderer) = self.shared.renderer.try_borrow_mut() {
            renderer.take();
        }
        self.shared.observer.borrow_mut().take();
        let mut state = self.shared.state.borrow_mut();
        state.params = None;
        state.latest_frame_params_id = None;
        state.dirty = false;
    }

    /// Draws one frame from the latest parameters.
    ///
    /// Returns `Ok(false)` without touching the backend if no parameters were
    /// ever prepared (or no renderer is bound). Otherwise draws, presents,
    /// clears the dirty flag and returns `Ok(true)`. If the renderer asks for
    /// another frame, the frontend is marked dirty again.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`LifecycleError::Reentrant`] when called from inside a render.
    /// - [`RenderError`] if drawing or presenting failed; the frontend stays
    ///   dirty.
    pub fn render(&self) -> Result<bool, Error> {
        let shared = &*self.shared;
        if shared.rendering.get() {
            return Err(shared.reentrant().into());
        }
        let backend = shared.backend.access()?;
        let Some(params) = shared.state.borrow().params.clone() else {
            return Ok(false);
        };
        if shared.renderer.borrow().is_none() {
            return Ok(false);
        }

        shared.rendering.set(true);
        let guard = RenderingGuard(&shared.rendering);
        let observer = shared.observer();
        if let Some(observer) = &observer {
            observer.on_will_start_rendering_frame();
        }

        // Cleared first so updates raised during the draw survive it.
        shared.state.borrow_mut().dirty = false;
        let report = match shared.draw(&backend, &params) {
            Ok(report) => report,
            Err(err) => {
                shared.state.borrow_mut().dirty = true;
                tracing::warn!(backend = %shared.backend.reference(), %err, "render failed");
                return Err(err);
            }
        };
        drop(guard);
        shared.frames.set(shared.frames.get() + 1);

        if let Some(observer) = &observer {
            if report.map_started {
                observer.on_will_start_rendering_map();
            }
            observer.on_did_finish_rendering_frame(report.status);
            if let Some(mode) = report.map_finished {
                observer.on_did_finish_rendering_map(mode);
            }
        }
        if report.status.needs_repaint {
            shared.mark_dirty();
        }
        Ok(true)
    }

    /// Pumps this thread's run loop, then renders if dirty.
    ///
    /// Returns whether a frame was drawn.
    ///
    /// # Errors
    ///
    /// As [`render`](Self::render).
    pub fn tick(&self) -> Result<bool, Error> {
        self.shared.scheduler.run_once();
        if !self.is_dirty() {
            return Ok(false);
        }
        self.render()
    }

    /// Resizes the backend and marks the frontend dirty.
    ///
    /// Call this before [`Map::set_size`](crate::map::Map::set_size).
    ///
    /// # Errors
    ///
    /// - [`LifecycleError`] after [`close`](Self::close) or during a render.
    /// - [`SurfaceError`] if the backend rejects the size.
    pub fn resize(&self, size: PhysicalSize) -> Result<(), Error> {
        let changed = self.with_backend(|backend| backend.resize(size))??;
        if changed {
            tracing::debug!(backend = %self.reference(), %size, "backend resized");
        }
        self.mark_dirty();
        Ok(())
    }

    /// Current backend size.
    ///
    /// # Errors
    ///
    /// As [`with_backend`](Self::with_backend).
    pub fn size(&self) -> Result<PhysicalSize, LifecycleError> {
        self.with_backend(|backend| backend.size())
    }

    /// Runs `f` with the backend.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::UseAfterFree`] after [`close`](Self::close).
    /// - [`LifecycleError::Reentrant`] during a render.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, LifecycleError> {
        let backend = self.shared.backend.access()?;
        let mut backend = backend
            .try_borrow_mut()
            .map_err(|_| self.shared.reentrant())?;
        Ok(f(&mut backend))
    }

    /// Destroys the backend and renderer.
    ///
    /// Idempotent. Later operations that need the backend fail with
    /// [`LifecycleError::UseAfterFree`].
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Reentrant`] when called from inside a render.
    pub fn close(&self) -> Result<(), LifecycleError> {
        if self.shared.rendering.get() {
            return Err(self.shared.reentrant());
        }
        self.reset();
        self.shared.backend.destroy();
        Ok(())
    }

    /// Returns whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.backend.is_destroyed()
    }
}

struct RenderingGuard<'a>(&'a Cell<bool>);

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{RenderFrameStatus, RenderMode};
    use crate::run_loop::RunLoop;
    use crate::surface::SurfaceDescriptor;
    use core::any::Any;

    struct CountingBackend {
        surface: SurfaceDescriptor,
        activations: u32,
        swaps: u32,
        implicit: bool,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                surface: SurfaceDescriptor::offscreen(400, 300, 1.0).unwrap(),
                activations: 0,
                swaps: 0,
                implicit: false,
            }
        }
    }

    impl RendererBackend for CountingBackend {
        fn surface(&self) -> &SurfaceDescriptor {
            &self.surface
        }

        fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
            self.surface.resize(size)
        }

        fn activate(&mut self) -> Result<(), SurfaceError> {
            self.activations += 1;
            Ok(())
        }

        fn deactivate(&mut self) {}

        fn swap(&mut self) -> Result<(), SurfaceError> {
            self.swaps += 1;
            Ok(())
        }

        fn presents_implicitly(&self) -> bool {
            self.implicit
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct ScriptedRenderer {
        reports: Vec<Result<RenderReport, RenderError>>,
    }

    impl NativeRenderer for ScriptedRenderer {
        fn render(
            &mut self,
            _backend: &mut dyn RendererBackend,
            _params: &FrameParams,
        ) -> Result<RenderReport, RenderError> {
            if self.reports.is_empty() {
                Ok(RenderReport::full())
            } else {
                self.reports.remove(0)
            }
        }
    }

    fn params() -> FrameParams {
        FrameParams::new((), PhysicalSize::new(400, 300))
    }

    fn frontend() -> (RunLoop, RendererFrontend<CountingBackend>) {
        let rl = RunLoop::new().unwrap();
        let fe = RendererFrontend::new(CountingBackend::new(), 1.0).unwrap();
        fe.bind_renderer(Box::new(ScriptedRenderer {
            reports: Vec::new(),
        }));
        (rl, fe)
    }

    #[test]
    fn requires_run_loop() {
        assert_eq!(
            RendererFrontend::new(CountingBackend::new(), 1.0).err(),
            Some(ConstructionError::NoRunLoop),
            "frontend needs a run loop"
        );
    }

    #[test]
    fn render_without_params_has_no_effect() {
        let (_rl, fe) = frontend();
        fe.mark_dirty();
        assert_eq!(fe.render(), Ok(false), "nothing prepared yet");
        assert!(fe.is_dirty(), "dirty untouched");
        assert_eq!(
            fe.with_backend(|b| b.activations).unwrap(),
            0,
            "backend untouched"
        );
        assert_eq!(fe.latest_frame_params_id(), None, "no params id");
    }

    #[test]
    fn update_invalidates_and_tick_renders_once() {
        let _rl = RunLoop::new().unwrap();
        let invalidations = Rc::new(Cell::new(0));
        let i = Rc::clone(&invalidations);
        let fe = RendererFrontend::with_invalidate(CountingBackend::new(), 1.0, move || {
            i.set(i.get() + 1);
        })
        .unwrap();
        fe.bind_renderer(Box::new(ScriptedRenderer {
            reports: Vec::new(),
        }));

        assert!(!fe.is_dirty(), "clean before any update");
        fe.update_sink().update(params());
        assert!(fe.is_dirty(), "update dirties");
        assert_eq!(invalidations.get(), 1, "host notified");
        assert_eq!(
            fe.latest_frame_params_id().map(FrameParamsId::get),
            Some(1),
            "first params id"
        );

        assert_eq!(fe.tick(), Ok(true), "dirty tick renders");
        assert!(!fe.is_dirty(), "render clears dirty");
        assert_eq!(fe.tick(), Ok(false), "clean tick skips");
        assert_eq!(fe.frame_count(), 1, "one frame");
        assert_eq!(fe.with_backend(|b| b.swaps).unwrap(), 1, "one present");
    }

    #[test]
    fn tick_pumps_run_loop_first() {
        let (rl, fe) = frontend();
        let sink = fe.update_sink();
        rl.scheduler()
            .schedule(move || {
                sink.update(params());
            })
            .unwrap();
        assert_eq!(fe.tick(), Ok(true), "queued update is applied then drawn");
    }

    #[test]
    fn needs_repaint_redirties() {
        let (_rl, fe) = frontend();
        fe.bind_renderer(Box::new(ScriptedRenderer {
            reports: vec![Ok(RenderReport {
                status: RenderFrameStatus {
                    mode: RenderMode::Partial,
                    needs_repaint: true,
                    placement_changed: false,
                },
                map_started: false,
                map_finished: None,
            })],
        }));
        fe.update(params());
        assert_eq!(fe.render(), Ok(true), "rendered");
        assert!(fe.is_dirty(), "renderer asked for another frame");
        assert_eq!(fe.render(), Ok(true), "second frame");
        assert!(!fe.is_dirty(), "settled");
    }

    #[test]
    fn failed_render_stays_dirty() {
        let (_rl, fe) = frontend();
        fe.bind_renderer(Box::new(ScriptedRenderer {
            reports: vec![Err(RenderError::Renderer("lost device".into()))],
        }));
        fe.update(params());
        assert!(fe.render().is_err(), "error propagates");
        assert!(fe.is_dirty(), "frame still owed");
        assert_eq!(fe.frame_count(), 0, "nothing drawn");
    }

    #[test]
    fn implicit_presenters_are_not_swapped() {
        let _rl = RunLoop::new().unwrap();
        let mut backend = CountingBackend::new();
        backend.implicit = true;
        let fe = RendererFrontend::new(backend, 2.0).unwrap();
        fe.bind_renderer(Box::new(ScriptedRenderer {
            reports: Vec::new(),
        }));
        fe.update(params());
        assert_eq!(fe.render(), Ok(true), "rendered");
        assert_eq!(fe.with_backend(|b| b.swaps).unwrap(), 0, "no swap");
    }

    #[test]
    fn resize_marks_dirty_and_is_idempotent() {
        let (_rl, fe) = frontend();
        fe.resize(PhysicalSize::new(800, 600)).unwrap();
        fe.resize(PhysicalSize::new(800, 600)).unwrap();
        assert!(fe.is_dirty(), "resize dirties");
        assert_eq!(
            fe.with_backend(|b| b.surface.reconfigurations()).unwrap(),
            1,
            "identical resize is a no-op"
        );
        assert!(
            fe.resize(PhysicalSize::new(0, 600)).is_err(),
            "zero size rejected"
        );
    }

    #[test]
    fn closed_frontend_reports_use_after_free() {
        let (_rl, fe) = frontend();
        fe.update(params());
        fe.close().unwrap();
        fe.close().unwrap();
        assert!(fe.is_closed(), "closed");
        assert_eq!(
            fe.render(),
            Err(Error::Lifecycle(LifecycleError::UseAfterFree {
                reference: fe.reference()
            })),
            "render after close"
        );
        assert!(
            fe.resize(PhysicalSize::new(10, 10)).is_err(),
            "resize after close"
        );
    }

    struct Reentering {
        frontend: RefCell<Option<RendererFrontend<CountingBackend>>>,
        nested: RefCell<Option<Result<bool, Error>>>,
    }

    impl RendererObserver for Reentering {
        fn on_will_start_rendering_frame(&self) {
            if let Some(fe) = self.frontend.borrow().as_ref() {
                *self.nested.borrow_mut() = Some(fe.render());
            }
        }
    }

    #[test]
    fn render_from_observer_is_rejected() {
        let (_rl, fe) = frontend();
        let observer = Rc::new(Reentering {
            frontend: RefCell::new(Some(fe.clone())),
            nested: RefCell::new(None),
        });
        let as_dyn: Rc<dyn RendererObserver> = observer.clone();
        fe.set_observer(&as_dyn);
        fe.update(params());

        assert_eq!(fe.render(), Ok(true), "outer render succeeds");
        assert_eq!(
            observer.nested.borrow_mut().take(),
            Some(Err(Error::Lifecycle(LifecycleError::Reentrant {
                reference: fe.reference()
            }))),
            "nested render is refused"
        );
        assert_eq!(fe.frame_count(), 1, "only the outer frame drawn");
        observer.frontend.borrow_mut().take();
    }
}
