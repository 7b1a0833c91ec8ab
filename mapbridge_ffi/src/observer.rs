// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host listeners made of C callbacks.

use core::ffi::{c_char, c_void};
use core::fmt;
use std::ffi::CString;

use mapbridge_core::error::MapLoadError;
use mapbridge_core::observer::{CameraChangeMode, MapObserver, RenderFrameStatus, RenderMode};

/// [`CameraChangeMode::Immediate`].
pub const MB_CAMERA_IMMEDIATE: i32 = 0;
/// [`CameraChangeMode::Animated`].
pub const MB_CAMERA_ANIMATED: i32 = 1;
/// [`RenderMode::Partial`].
pub const MB_RENDER_PARTIAL: i32 = 0;
/// [`RenderMode::Full`].
pub const MB_RENDER_FULL: i32 = 1;

/// A callback taking only the host's `user_data`.
pub type MbCallback = unsafe extern "C" fn(user_data: *mut c_void);
/// A callback taking a mode code.
pub type MbModeCallback = unsafe extern "C" fn(user_data: *mut c_void, mode: i32);
/// A callback taking a NUL-terminated string valid for the call only.
pub type MbStringCallback = unsafe extern "C" fn(user_data: *mut c_void, value: *const c_char);
/// `did_fail_loading_map`: a [`MapLoadError::code`] and a message.
pub type MbFailCallback =
    unsafe extern "C" fn(user_data: *mut c_void, error: i32, message: *const c_char);
/// `did_finish_rendering_frame`.
pub type MbFrameCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    mode: i32,
    needs_repaint: bool,
    placement_changed: bool,
);

/// Optional callbacks for every map event.
///
/// Null entries are skipped. Every callback receives the `user_data` passed
/// to `mapbridge_observer_create` and runs on the map's thread. Callbacks must
/// not unwind.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct MbObserverVtable {
    /// Mode is `MB_CAMERA_IMMEDIATE` or `MB_CAMERA_ANIMATED`.
    pub camera_will_change: Option<MbModeCallback>,
    /// Camera moved during a gesture or animation.
    pub camera_is_changing: Option<MbCallback>,
    /// Mode is `MB_CAMERA_IMMEDIATE` or `MB_CAMERA_ANIMATED`.
    pub camera_did_change: Option<MbModeCallback>,
    /// A style load began.
    pub will_start_loading_map: Option<MbCallback>,
    /// Style and tiles finished loading.
    pub did_finish_loading_map: Option<MbCallback>,
    /// A style load failed.
    pub did_fail_loading_map: Option<MbFailCallback>,
    /// A frame is about to be drawn.
    pub will_start_rendering_frame: Option<MbCallback>,
    /// A frame was drawn.
    pub did_finish_rendering_frame: Option<MbFrameCallback>,
    /// Drawing of a newly loaded map began.
    pub will_start_rendering_map: Option<MbCallback>,
    /// Mode is `MB_RENDER_PARTIAL` or `MB_RENDER_FULL`.
    pub did_finish_rendering_map: Option<MbModeCallback>,
    /// The style was parsed and applied.
    pub did_finish_loading_style: Option<MbCallback>,
    /// A layer referenced an image the style lacks.
    pub style_image_missing: Option<MbStringCallback>,
    /// Nothing left to load, animate or draw.
    pub did_become_idle: Option<MbCallback>,
    /// Called exactly once, when the listener is dropped, so the host can
    /// unroot whatever `user_data` points at.
    pub release_user_data: Option<MbCallback>,
}

impl fmt::Debug for MbObserverVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MbObserverVtable")
            .field("release_user_data", &self.release_user_data.is_some())
            .finish_non_exhaustive()
    }
}

fn camera_code(mode: CameraChangeMode) -> i32 {
    match mode {
        CameraChangeMode::Immediate => MB_CAMERA_IMMEDIATE,
        CameraChangeMode::Animated => MB_CAMERA_ANIMATED,
    }
}

fn render_code(mode: RenderMode) -> i32 {
    match mode {
        RenderMode::Partial => MB_RENDER_PARTIAL,
        RenderMode::Full => MB_RENDER_FULL,
    }
}

fn c_string(value: &str) -> CString {
    CString::new(value.replace('\0', "")).unwrap_or_default()
}

/// A [`MapObserver`] that forwards to a vtable.
///
/// The listener lives inside an `ObserverBridge`, which the observer handle
/// and every map created with it share. `release_user_data` therefore runs
/// when the last of those goes away.
pub(crate) struct HostObserver {
    vtable: MbObserverVtable,
    user_data: *mut c_void,
}

impl HostObserver {
    /// # Safety
    ///
    /// Every callback in `vtable` must be safe to call with `user_data` on
    /// this thread until `release_user_data` has run.
    pub(crate) unsafe fn new(vtable: MbObserverVtable, user_data: *mut c_void) -> Self {
        Self { vtable, user_data }
    }

    fn call(&self, callback: Option<MbCallback>) {
        if let Some(callback) = callback {
            // SAFETY: guaranteed by the caller of `new`.
            unsafe { callback(self.user_data) };
        }
    }

    fn call_mode(&self, callback: Option<MbModeCallback>, mode: i32) {
        if let Some(callback) = callback {
            // SAFETY: guaranteed by the caller of `new`.
            unsafe { callback(self.user_data, mode) };
        }
    }
}

impl Drop for HostObserver {
    fn drop(&mut self) {
        let release = self.vtable.release_user_data.take();
        self.call(release);
    }
}

impl MapObserver for HostObserver {
    fn on_camera_will_change(&mut self, mode: CameraChangeMode) {
        self.call_mode(self.vtable.camera_will_change, camera_code(mode));
    }

    fn on_camera_is_changing(&mut self) {
        self.call(self.vtable.camera_is_changing);
    }

    fn on_camera_did_change(&mut self, mode: CameraChangeMode) {
        self.call_mode(self.vtable.camera_did_change, camera_code(mode));
    }

    fn on_will_start_loading_map(&mut self) {
        self.call(self.vtable.will_start_loading_map);
    }

    fn on_did_finish_loading_map(&mut self) {
        self.call(self.vtable.did_finish_loading_map);
    }

    fn on_did_fail_loading_map(&mut self, error: MapLoadError, message: &str) {
        if let Some(callback) = self.vtable.did_fail_loading_map {
            let message = c_string(message);
            // SAFETY: guaranteed by the caller of `new`; `message` outlives
            // the call.
            unsafe { callback(self.user_data, error.code(), message.as_ptr()) };
        }
    }

    fn on_will_start_rendering_frame(&mut self) {
        self.call(self.vtable.will_start_rendering_frame);
    }

    fn on_did_finish_rendering_frame(&mut self, status: RenderFrameStatus) {
        if let Some(callback) = self.vtable.did_finish_rendering_frame {
            // SAFETY: guaranteed by the caller of `new`.
            unsafe {
                callback(
                    self.user_data,
                    render_code(status.mode),
                    status.needs_repaint,
                    status.placement_changed,
                );
            }
        }
    }

    fn on_will_start_rendering_map(&mut self) {
        self.call(self.vtable.will_start_rendering_map);
    }

    fn on_did_finish_rendering_map(&mut self, mode: RenderMode) {
        self.call_mode(self.vtable.did_finish_rendering_map, render_code(mode));
    }

    fn on_did_finish_loading_style(&mut self) {
        self.call(self.vtable.did_finish_loading_style);
    }

    fn on_style_image_missing(&mut self, image_id: &str) {
        if let Some(callback) = self.vtable.style_image_missing {
            let image_id = c_string(image_id);
            // SAFETY: guaranteed by the caller of `new`; `image_id` outlives
            // the call.
            unsafe { callback(self.user_data, image_id.as_ptr()) };
        }
    }

    fn on_did_become_idle(&mut self) {
        self.call(self.vtable.did_become_idle);
    }
}
