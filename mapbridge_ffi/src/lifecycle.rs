// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entry points for the library, run loops, backends, frontends and
//! observers.

use core::ffi::{c_char, c_void};
use std::ffi::CString;
use std::rc::Rc;

use mapbridge_core::error::ConstructionError;
use mapbridge_core::library;
use mapbridge_core::observer::ObserverBridge;
use mapbridge_core::run_loop::{RunLoop, Scheduler};
use mapbridge_core::surface::PhysicalSize;
use mapbridge_harness::HeadlessBackend;

use crate::args::{OptionalOut, Out};
use crate::observer::{HostObserver, MbCallback, MbObserverVtable};
use crate::registry::{self, Backend, Frontend, Object};
use crate::status::{FfiError, MbStatus, guard, last_error_ptr};

/// An opaque object reference. Zero is never a live handle.
pub type MbHandle = u64;

/// Message of the most recent failed call on this thread, or null.
///
/// The pointer stays valid until the next call into this library on the same
/// thread. Successful calls clear the message.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_last_error() -> *const c_char {
    last_error_ptr()
}

/// Frees a string returned by this library. Null is ignored.
///
/// # Safety
///
/// `s` must be null or a string from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_string_free(s: *mut c_char) {
    if !s.is_null() {
        // SAFETY: the pointer came from `CString::into_raw` per the contract.
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Number of live handles on the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_live_handles() -> u64 {
    registry::live() as u64
}

/// Installs the map engine. Later calls do nothing.
///
/// With the `headless` feature the headless reference engine is installed,
/// reading styles from `file://` URLs. Without it, an engine must be installed
/// by a Rust embedder through `mapbridge_core::library::load`, and this call
/// only reports whether one was.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_library_load() -> MbStatus {
    guard("mapbridge_library_load", || {
        #[cfg(feature = "headless")]
        let _engine = library::load(|| Box::new(headless_engine()));
        library::engine()?;
        Ok(())
    })
}

#[cfg(feature = "headless")]
fn headless_engine() -> mapbridge_harness::HeadlessEngine {
    use mapbridge_harness::{CompositeLoader, FileLoader, HeadlessEngine};

    let loader = match FileLoader::new() {
        Ok(files) => CompositeLoader::new().route("file", files),
        Err(err) => {
            tracing::warn!(%err, "file loader unavailable; only inline styles will load");
            CompositeLoader::new()
        }
    };
    HeadlessEngine::new(loader)
}

/// Binds a run loop to the calling thread.
///
/// # Safety
///
/// `out` must be valid for writing a handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_run_loop_create(out: *mut MbHandle) -> MbStatus {
    guard("mapbridge_run_loop_create", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        let run_loop = RunLoop::new()?;
        out.write(registry::insert(Object::RunLoop(Rc::new(run_loop))));
        Ok(())
    })
}

/// Runs the callbacks that were queued when the call began.
///
/// # Safety
///
/// `out_ran` must be null or valid for writing a `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_run_loop_run_once(
    run_loop: MbHandle,
    out_ran: *mut u64,
) -> MbStatus {
    guard("mapbridge_run_loop_run_once", || {
        // SAFETY: forwarded contract.
        let out = unsafe { OptionalOut::new(out_ran) };
        let ran = registry::run_loop(run_loop)?.run_once();
        out.write(ran as u64);
        Ok(())
    })
}

/// Stops the run loop; later `run_once` calls do nothing.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_run_loop_stop(run_loop: MbHandle) -> MbStatus {
    guard("mapbridge_run_loop_stop", || {
        registry::run_loop(run_loop)?.stop();
        Ok(())
    })
}

/// Unbinds and destroys the run loop. Stale handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_run_loop_destroy(run_loop: MbHandle) -> MbStatus {
    guard("mapbridge_run_loop_destroy", || {
        drop(registry::destroy(run_loop, "run loop", |o| {
            matches!(o, Object::RunLoop(_))
        })?);
        Ok(())
    })
}

/// Creates an in-memory backend of `width`×`height` physical pixels.
///
/// # Safety
///
/// `out` must be valid for writing a handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_backend_create_offscreen(
    width: u32,
    height: u32,
    pixel_ratio: f32,
    out: *mut MbHandle,
) -> MbStatus {
    guard("mapbridge_backend_create_offscreen", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        let backend: Backend = Box::new(HeadlessBackend::new(width, height, pixel_ratio)?);
        out.write(registry::insert(Object::Backend(backend)));
        Ok(())
    })
}

/// Destroys a backend that was never bound to a frontend. Stale handles,
/// including backends consumed by `mapbridge_frontend_create`, are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_backend_destroy(backend: MbHandle) -> MbStatus {
    guard("mapbridge_backend_destroy", || {
        drop(registry::destroy(backend, "backend", |o| {
            matches!(o, Object::Backend(_))
        })?);
        Ok(())
    })
}

/// Binds a frontend to `backend`, which is consumed: its handle goes stale.
///
/// `on_invalidate`, when non-null, is called with `user_data` whenever the
/// frontend needs a new frame.
///
/// # Safety
///
/// `out` must be valid for writing a handle. `on_invalidate` must be safe to
/// call with `user_data` on this thread for the frontend's lifetime.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_frontend_create(
    backend: MbHandle,
    pixel_ratio: f32,
    on_invalidate: Option<MbCallback>,
    user_data: *mut c_void,
    out: *mut MbHandle,
) -> MbStatus {
    guard("mapbridge_frontend_create", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(FfiError::InvalidArgument(format!(
                "pixel ratio must be positive, got {pixel_ratio}"
            )));
        }
        // A failed call must leave the backend handle usable.
        if Scheduler::current().is_none() {
            return Err(ConstructionError::NoRunLoop.into());
        }
        let backend = registry::take_backend(backend)?;
        let frontend = match on_invalidate {
            Some(callback) => Frontend::with_invalidate(backend, pixel_ratio, move || {
                // SAFETY: guaranteed by the caller of `mapbridge_frontend_create`.
                unsafe { callback(user_data) };
            })?,
            None => Frontend::new(backend, pixel_ratio)?,
        };
        out.write(registry::insert(Object::Frontend(frontend)));
        Ok(())
    })
}

/// Draws a frame if parameters were prepared. Writes whether one was drawn.
///
/// # Safety
///
/// `out_drew` must be null or valid for writing a `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_frontend_render(
    frontend: MbHandle,
    out_drew: *mut bool,
) -> MbStatus {
    guard("mapbridge_frontend_render", || {
        // SAFETY: forwarded contract.
        let out = unsafe { OptionalOut::new(out_drew) };
        out.write(registry::frontend(frontend)?.render()?);
        Ok(())
    })
}

/// Pumps the run loop and renders if dirty. Writes whether a frame was drawn.
///
/// # Safety
///
/// `out_drew` must be null or valid for writing a `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_frontend_tick(
    frontend: MbHandle,
    out_drew: *mut bool,
) -> MbStatus {
    guard("mapbridge_frontend_tick", || {
        // SAFETY: forwarded contract.
        let out = unsafe { OptionalOut::new(out_drew) };
        out.write(registry::frontend(frontend)?.tick()?);
        Ok(())
    })
}

/// Resizes the backend, in physical pixels. Call before
/// `mapbridge_map_set_size`.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_frontend_resize(
    frontend: MbHandle,
    width: u32,
    height: u32,
) -> MbStatus {
    guard("mapbridge_frontend_resize", || {
        registry::frontend(frontend)?.resize(PhysicalSize::new(width, height))?;
        Ok(())
    })
}

/// Writes whether the frontend has a frame to draw.
///
/// # Safety
///
/// `out` must be valid for writing a `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_frontend_is_dirty(
    frontend: MbHandle,
    out: *mut bool,
) -> MbStatus {
    guard("mapbridge_frontend_is_dirty", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        out.write(registry::frontend(frontend)?.is_dirty());
        Ok(())
    })
}

/// Releases the host's frontend handle. Stale handles are ignored.
///
/// A map created with this frontend keeps rendering through it; the backend
/// is destroyed once the last such map is destroyed too.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_frontend_destroy(frontend: MbHandle) -> MbStatus {
    guard("mapbridge_frontend_destroy", || {
        drop(registry::destroy(frontend, "frontend", |o| {
            matches!(o, Object::Frontend(_))
        })?);
        Ok(())
    })
}

/// Wraps a table of C callbacks in an observer bridge.
///
/// `vtable` is copied. `release_user_data` runs once, after this handle and
/// every map created with it are destroyed.
///
/// # Safety
///
/// `vtable` must point at a valid vtable and `out` be valid for writing a
/// handle. Every callback must be safe to call with `user_data` on this
/// thread until `release_user_data` has run.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_observer_create(
    vtable: *const MbObserverVtable,
    user_data: *mut c_void,
    out: *mut MbHandle,
) -> MbStatus {
    guard("mapbridge_observer_create", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        if vtable.is_null() {
            return Err(FfiError::Null("vtable"));
        }
        // SAFETY: non-null and valid per the contract.
        let vtable = unsafe { *vtable };
        // SAFETY: forwarded contract.
        let listener = unsafe { HostObserver::new(vtable, user_data) };
        out.write(registry::insert(Object::Observer(ObserverBridge::new(listener))));
        Ok(())
    })
}

/// Writes the number of events delivered and the number of listener faults.
///
/// # Safety
///
/// Both pointers must be null or valid for writing a `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_observer_counts(
    observer: MbHandle,
    out_delivered: *mut u64,
    out_faults: *mut u64,
) -> MbStatus {
    guard("mapbridge_observer_counts", || {
        // SAFETY: forwarded contract.
        let (delivered, faults) =
            unsafe { (OptionalOut::new(out_delivered), OptionalOut::new(out_faults)) };
        let bridge = registry::observer(observer)?;
        delivered.write(bridge.delivered_count());
        faults.write(bridge.fault_count());
        Ok(())
    })
}

/// Releases the host's reference to the observer. Stale handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_observer_destroy(observer: MbHandle) -> MbStatus {
    guard("mapbridge_observer_destroy", || {
        drop(registry::destroy(observer, "observer", |o| {
            matches!(o, Object::Observer(_))
        })?);
        Ok(())
    })
}
