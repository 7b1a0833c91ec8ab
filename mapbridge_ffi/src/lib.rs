// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C ABI for Mapbridge.
//!
//! Hosts that cannot hold Rust values (garbage-collected runtimes reaching in
//! through a foreign function interface) drive maps through integer handles:
//!
//! ```text
//! mapbridge_library_load()
//! mapbridge_run_loop_create(&loop)
//! mapbridge_backend_create_offscreen(w, h, ratio, &backend)
//! mapbridge_frontend_create(backend, ratio, on_invalidate, ud, &frontend)
//! mapbridge_observer_create(&vtable, ud, &observer)
//! mapbridge_map_create(frontend, observer, config_json, &map)
//! loop { mapbridge_map_tick(map, &drew) }
//! mapbridge_map_destroy(map) ... mapbridge_run_loop_destroy(loop)
//! ```
//!
//! # Handles
//!
//! Every object lives in a table owned by the thread that created it; a
//! handle is a generational index into that table. A destroyed handle is
//! never reused, so calls on it fail with [`MB_ERR_USE_AFTER_FREE`] instead of
//! touching freed memory, and `*_destroy` on it returns [`MB_OK`] and does
//! nothing. Host finalizers and explicit `close()` methods can both call
//! `*_destroy` without coordinating. Handles are meaningless on other
//! threads.
//!
//! # Errors
//!
//! Every fallible entry point returns an [`MbStatus`]. The message of the
//! last failure on the calling thread is available from
//! [`mapbridge_last_error`]. Panics never cross the boundary: they are caught
//! and reported as [`MB_ERR_PANIC`].
//!
//! # Observers
//!
//! [`MbObserverVtable`] holds optional C callbacks plus `release_user_data`,
//! which runs exactly once when the listener is dropped, so hosts can keep
//! their listener object rooted for exactly as long as the engine may call it.

#![expect(unsafe_code, reason = "a C ABI is made of unsafe extern functions")]

mod args;
mod lifecycle;
mod map;
mod observer;
mod registry;
mod status;

pub use lifecycle::{
    MbHandle, mapbridge_backend_create_offscreen, mapbridge_backend_destroy,
    mapbridge_frontend_create, mapbridge_frontend_destroy, mapbridge_frontend_is_dirty,
    mapbridge_frontend_render, mapbridge_frontend_resize, mapbridge_frontend_tick,
    mapbridge_last_error, mapbridge_library_load, mapbridge_live_handles,
    mapbridge_observer_counts, mapbridge_observer_create, mapbridge_observer_destroy,
    mapbridge_run_loop_create, mapbridge_run_loop_destroy, mapbridge_run_loop_run_once,
    mapbridge_run_loop_stop, mapbridge_string_free,
};
pub use map::{
    mapbridge_map_create, mapbridge_map_destroy, mapbridge_map_ease_to, mapbridge_map_fly_to,
    mapbridge_map_get_camera, mapbridge_map_get_debug, mapbridge_map_jump_to,
    mapbridge_map_lat_lng_for_pixel, mapbridge_map_load_style_json, mapbridge_map_load_style_url,
    mapbridge_map_move_by, mapbridge_map_pitch_by, mapbridge_map_pixel_for_lat_lng,
    mapbridge_map_rotate_by, mapbridge_map_scale_by, mapbridge_map_set_debug,
    mapbridge_map_set_gesture_in_progress, mapbridge_map_set_rendering_stats_view,
    mapbridge_map_set_size, mapbridge_map_tick, mapbridge_map_trigger_repaint,
};
pub use observer::{
    MB_CAMERA_ANIMATED, MB_CAMERA_IMMEDIATE, MB_RENDER_FULL, MB_RENDER_PARTIAL, MbCallback,
    MbFailCallback, MbFrameCallback, MbModeCallback, MbObserverVtable, MbStringCallback,
};
pub use status::{
    MB_ERR_ALREADY_BOUND, MB_ERR_INVALID_ARGUMENT, MB_ERR_INVALID_CAMERA, MB_ERR_INVALID_HANDLE,
    MB_ERR_NULL, MB_ERR_PANIC, MB_ERR_PRECONDITION, MB_ERR_USE_AFTER_FREE, MB_OK, MbStatus,
};
