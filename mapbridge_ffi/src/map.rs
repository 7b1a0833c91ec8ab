// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Map entry points.
//!
//! Camera records cross the boundary as JSON objects with the fields of
//! [`CameraOptions`]: `center` (`{"latitude", "longitude"}`), `anchor`
//! (`{"x", "y"}`), `padding`, `zoom`, `bearing` and `pitch`, all optional.

use core::ffi::c_char;
use std::rc::Rc;

use mapbridge_core::camera::{AnimationOptions, CameraOptions, LatLng, ScreenCoordinate};
use mapbridge_core::debug::MapDebugOptions;
use mapbridge_core::map::Map;
use mapbridge_core::observer::ObserverBridge;
use mapbridge_core::options::MapConfig;
use mapbridge_core::surface::PhysicalSize;

use crate::args::{OptionalOut, Out, finite, owned_c_string, positive_finite, str_arg};
use crate::lifecycle::MbHandle;
use crate::registry::{self, FfiMap, Object};
use crate::status::{FfiError, MbStatus, guard};

fn camera_arg(json: &str) -> Result<CameraOptions, FfiError> {
    serde_json::from_str(json).map_err(|e| FfiError::InvalidArgument(format!("camera: {e}")))
}

/// Runs `f` with a live map.
fn with_map(
    name: &'static str,
    map: MbHandle,
    f: impl FnOnce(&FfiMap) -> Result<(), FfiError>,
) -> MbStatus {
    guard(name, || {
        let map: Rc<FfiMap> = registry::map(map)?;
        f(&map)
    })
}

/// Creates a map drawing through `frontend` and reporting to `observer`.
///
/// `observer` may be 0 for a map without a listener. `config_json` may be null
/// for default options; otherwise it is a JSON object with optional `map`,
/// `resources` and `client` records. Requires `mapbridge_library_load`.
///
/// # Safety
///
/// `config_json` must be null or a NUL-terminated string, and `out` valid for
/// writing a handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_create(
    frontend: MbHandle,
    observer: MbHandle,
    config_json: *const c_char,
    out: *mut MbHandle,
) -> MbStatus {
    guard("mapbridge_map_create", || {
        // SAFETY: forwarded contract.
        let out = unsafe { Out::new(out, "out") }?;
        let config = if config_json.is_null() {
            MapConfig::default()
        } else {
            // SAFETY: forwarded contract.
            MapConfig::from_json(unsafe { str_arg(config_json, "config_json") }?)?
        };
        let frontend = registry::frontend(frontend)?;
        let observer = if observer == 0 {
            ObserverBridge::noop()
        } else {
            registry::observer(observer)?
        };
        let map = Map::with_library(
            frontend,
            observer,
            config.map,
            config.resources,
            config.client,
        )?;
        out.write(registry::insert(Object::Map(Rc::new(map))));
        Ok(())
    })
}

/// Closes and destroys the map. Stale handles are ignored.
///
/// The frontend stays usable for a new map.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_destroy(map: MbHandle) -> MbStatus {
    guard("mapbridge_map_destroy", || {
        if let Some(Object::Map(map)) =
            registry::destroy(map, "map", |o| matches!(o, Object::Map(_)))?
        {
            map.close();
        }
        Ok(())
    })
}

/// Starts loading a style from `url`. The outcome arrives through the
/// observer.
///
/// # Safety
///
/// `url` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_load_style_url(
    map: MbHandle,
    url: *const c_char,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let url = unsafe { str_arg(url, "url") };
    with_map("mapbridge_map_load_style_url", map, |map| {
        map.load_style_url(url?)?;
        Ok(())
    })
}

/// Starts loading a style document. The outcome arrives through the
/// observer.
///
/// # Safety
///
/// `json` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_load_style_json(
    map: MbHandle,
    json: *const c_char,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let json = unsafe { str_arg(json, "json") };
    with_map("mapbridge_map_load_style_json", map, |map| {
        map.load_style_json(json?)?;
        Ok(())
    })
}

/// Moves the camera immediately.
///
/// # Safety
///
/// `camera_json` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_jump_to(
    map: MbHandle,
    camera_json: *const c_char,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let camera = unsafe { str_arg(camera_json, "camera_json") };
    with_map("mapbridge_map_jump_to", map, |map| {
        map.jump_to(&camera_arg(camera?)?)?;
        Ok(())
    })
}

/// Animates the camera over `duration_ms`. Replaces any running animation.
///
/// # Safety
///
/// `camera_json` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_ease_to(
    map: MbHandle,
    camera_json: *const c_char,
    duration_ms: u64,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let camera = unsafe { str_arg(camera_json, "camera_json") };
    with_map("mapbridge_map_ease_to", map, |map| {
        map.ease_to(&camera_arg(camera?)?, AnimationOptions::from_millis(duration_ms))?;
        Ok(())
    })
}

/// Flies the camera over `duration_ms`, zooming out along the way.
///
/// # Safety
///
/// `camera_json` must be a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_fly_to(
    map: MbHandle,
    camera_json: *const c_char,
    duration_ms: u64,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let camera = unsafe { str_arg(camera_json, "camera_json") };
    with_map("mapbridge_map_fly_to", map, |map| {
        map.fly_to(&camera_arg(camera?)?, AnimationOptions::from_millis(duration_ms))?;
        Ok(())
    })
}

/// Writes the current camera as JSON. Free it with `mapbridge_string_free`.
///
/// # Safety
///
/// `out_json` must be valid for writing a pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_get_camera(
    map: MbHandle,
    out_json: *mut *mut c_char,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let out = unsafe { Out::new(out_json, "out_json") };
    with_map("mapbridge_map_get_camera", map, |map| {
        let out = out?;
        let camera = map.camera_options()?;
        let json = serde_json::to_string(&camera)
            .map_err(|e| FfiError::InvalidArgument(e.to_string()))?;
        out.write(owned_c_string(json)?);
        Ok(())
    })
}

/// Tells the map its surface size in physical pixels. Call after
/// `mapbridge_frontend_resize`.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_set_size(map: MbHandle, width: u32, height: u32) -> MbStatus {
    with_map("mapbridge_map_set_size", map, |map| {
        map.set_size(PhysicalSize::new(width, height))?;
        Ok(())
    })
}

/// Pans by a screen-space delta.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_move_by(map: MbHandle, dx: f64, dy: f64) -> MbStatus {
    with_map("mapbridge_map_move_by", map, |map| {
        let delta = ScreenCoordinate::new(finite(dx, "dx")?, finite(dy, "dy")?);
        map.move_by(delta)?;
        Ok(())
    })
}

/// Zooms by a factor, around `(anchor_x, anchor_y)` when `has_anchor` is set
/// and around the viewport center otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_scale_by(
    map: MbHandle,
    scale: f64,
    has_anchor: bool,
    anchor_x: f64,
    anchor_y: f64,
) -> MbStatus {
    with_map("mapbridge_map_scale_by", map, |map| {
        let scale = positive_finite(scale, "scale")?;
        let anchor = if has_anchor {
            Some(ScreenCoordinate::new(
                finite(anchor_x, "anchor_x")?,
                finite(anchor_y, "anchor_y")?,
            ))
        } else {
            None
        };
        map.scale_by(scale, anchor)?;
        Ok(())
    })
}

/// Rotates by the angle between two screen points around the center.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_rotate_by(
    map: MbHandle,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
) -> MbStatus {
    with_map("mapbridge_map_rotate_by", map, |map| {
        let first = ScreenCoordinate::new(finite(x1, "x1")?, finite(y1, "y1")?);
        let second = ScreenCoordinate::new(finite(x2, "x2")?, finite(y2, "y2")?);
        map.rotate_by(first, second)?;
        Ok(())
    })
}

/// Tilts by `delta` degrees.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_pitch_by(map: MbHandle, delta: f64) -> MbStatus {
    with_map("mapbridge_map_pitch_by", map, |map| {
        map.pitch_by(finite(delta, "delta")?)?;
        Ok(())
    })
}

/// Marks the start (`true`) or end (`false`) of a user gesture. Calls must be
/// paired.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_set_gesture_in_progress(
    map: MbHandle,
    in_progress: bool,
) -> MbStatus {
    with_map("mapbridge_map_set_gesture_in_progress", map, |map| {
        map.set_gesture_in_progress(in_progress)?;
        Ok(())
    })
}

/// Projects a geographic point to screen pixels.
///
/// # Safety
///
/// `out_x` and `out_y` must be valid for writing an `f64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_pixel_for_lat_lng(
    map: MbHandle,
    latitude: f64,
    longitude: f64,
    out_x: *mut f64,
    out_y: *mut f64,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let out = unsafe { (Out::new(out_x, "out_x"), Out::new(out_y, "out_y")) };
    with_map("mapbridge_map_pixel_for_lat_lng", map, |map| {
        let (out_x, out_y) = (out.0?, out.1?);
        let pixel = map.pixel_for_lat_lng(LatLng::new(latitude, longitude))?;
        out_x.write(pixel.x);
        out_y.write(pixel.y);
        Ok(())
    })
}

/// Unprojects a screen pixel to a geographic point.
///
/// # Safety
///
/// `out_latitude` and `out_longitude` must be valid for writing an `f64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_lat_lng_for_pixel(
    map: MbHandle,
    x: f64,
    y: f64,
    out_latitude: *mut f64,
    out_longitude: *mut f64,
) -> MbStatus {
    // SAFETY: forwarded contract.
    let out = unsafe {
        (
            Out::new(out_latitude, "out_latitude"),
            Out::new(out_longitude, "out_longitude"),
        )
    };
    with_map("mapbridge_map_lat_lng_for_pixel", map, |map| {
        let (out_latitude, out_longitude) = (out.0?, out.1?);
        let lat_lng = map.lat_lng_for_pixel(ScreenCoordinate::new(x, y))?;
        out_latitude.write(lat_lng.latitude);
        out_longitude.write(lat_lng.longitude);
        Ok(())
    })
}

/// Replaces the debug overlay bitmask. Unknown bits are dropped.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_set_debug(map: MbHandle, flags: u32) -> MbStatus {
    with_map("mapbridge_map_set_debug", map, |map| {
        map.set_debug(MapDebugOptions::from_bits_truncate(flags))?;
        Ok(())
    })
}

/// Writes the debug overlay bitmask.
///
/// # Safety
///
/// `out_flags` must be valid for writing a `u32`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_get_debug(map: MbHandle, out_flags: *mut u32) -> MbStatus {
    // SAFETY: forwarded contract.
    let out = unsafe { Out::new(out_flags, "out_flags") };
    with_map("mapbridge_map_get_debug", map, |map| {
        out?.write(map.debug()?.bits());
        Ok(())
    })
}

/// Shows or hides the rendering statistics overlay.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_set_rendering_stats_view(map: MbHandle, enabled: bool) -> MbStatus {
    with_map("mapbridge_map_set_rendering_stats_view", map, |map| {
        map.set_rendering_stats_view_enabled(enabled)?;
        Ok(())
    })
}

/// Requests a new frame even if nothing changed.
#[unsafe(no_mangle)]
pub extern "C" fn mapbridge_map_trigger_repaint(map: MbHandle) -> MbStatus {
    with_map("mapbridge_map_trigger_repaint", map, |map| {
        map.trigger_repaint()?;
        Ok(())
    })
}

/// Pumps the run loop and renders if needed. Call from the host's frame
/// timer; writes whether a frame was drawn.
///
/// # Safety
///
/// `out_drew` must be null or valid for writing a `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapbridge_map_tick(map: MbHandle, out_drew: *mut bool) -> MbStatus {
    // SAFETY: forwarded contract.
    let out = unsafe { OptionalOut::new(out_drew) };
    with_map("mapbridge_map_tick", map, |map| {
        out.write(map.tick()?);
        Ok(())
    })
}
