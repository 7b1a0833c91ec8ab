// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web Mercator camera transform.
//!
//! World coordinates are pixels of a square world `512 * 2^zoom` wide, origin
//! at the top left (180°W, 85.05°N). Screen coordinates are logical pixels.
//! Projection is planar: pitch is tracked and clamped but does not tilt the
//! projection.

use core::f64::consts::PI;

use kurbo::{Affine, Point, Size, Vec2};
use mapbridge_core::options::NorthOrientation;
use mapbridge_core::{CameraOptions, EdgeInsets, LatLng, ScreenCoordinate};

/// Side of one tile in world pixels.
pub const TILE_SIZE: f64 = 512.0;
/// Latitude at which the Mercator world becomes square.
pub const MAX_LATITUDE: f64 = 85.051_129;
/// Lowest zoom level.
pub const MIN_ZOOM: f64 = 0.0;
/// Highest zoom level.
pub const MAX_ZOOM: f64 = 22.0;
/// Steepest pitch in degrees.
pub const MAX_PITCH: f64 = 60.0;

/// Width of the world in pixels at `zoom`.
#[must_use]
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

/// Projects a coordinate to world pixels at `zoom`.
#[must_use]
pub fn project(lat_lng: LatLng, zoom: f64) -> Point {
    let ws = world_size(zoom);
    let lat = lat_lng.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = (180.0 + lat_lng.longitude) / 360.0 * ws;
    let y = (180.0 - (180.0 / PI) * (PI / 4.0 + lat * PI / 360.0).tan().ln()) / 360.0 * ws;
    Point::new(x, y)
}

/// Inverse of [`project`].
#[must_use]
pub fn unproject(point: Point, zoom: f64) -> LatLng {
    let ws = world_size(zoom);
    let y = 180.0 - point.y / ws * 360.0;
    LatLng::new(
        360.0 / PI * (y * PI / 180.0).exp().atan() - 90.0,
        point.x / ws * 360.0 - 180.0,
    )
}

/// Normalizes a bearing to `(-180, 180]`.
#[must_use]
pub fn normalize_bearing(bearing: f64) -> f64 {
    let b = bearing.rem_euclid(360.0);
    if b > 180.0 { b - 360.0 } else { b }
}

/// The camera of one map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    size: Size,
    center: LatLng,
    zoom: f64,
    bearing: f64,
    pitch: f64,
    padding: EdgeInsets,
    north: NorthOrientation,
}

impl Transform {
    /// A camera at 0°, 0° and zoom 0 over a `size` viewport.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size,
            center: LatLng::default(),
            zoom: 0.0,
            bearing: 0.0,
            pitch: 0.0,
            padding: EdgeInsets::default(),
            north: NorthOrientation::Upwards,
        }
    }

    /// Points north toward `north` at zero bearing.
    #[must_use]
    pub fn with_north_orientation(mut self, north: NorthOrientation) -> Self {
        self.north = north;
        self
    }

    /// Viewport size in logical pixels.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Sets the viewport size in logical pixels.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Center coordinate.
    #[must_use]
    pub fn center(&self) -> LatLng {
        self.center
    }

    /// Zoom level.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Bearing in degrees.
    #[must_use]
    pub fn bearing(&self) -> f64 {
        self.bearing
    }

    /// Pitch in degrees.
    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Viewport padding.
    #[must_use]
    pub fn padding(&self) -> EdgeInsets {
        self.padding
    }

    /// The camera as options with every field but `anchor` set.
    #[must_use]
    pub fn camera(&self) -> CameraOptions {
        CameraOptions {
            center: Some(self.center),
            padding: Some(self.padding),
            anchor: None,
            zoom: Some(self.zoom),
            bearing: Some(self.bearing),
            pitch: Some(self.pitch),
        }
    }

    /// Sets the center, clamping the latitude and wrapping the longitude.
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(
            center.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            center.longitude,
        )
        .wrapped();
    }

    /// Sets the zoom, clamped to the supported range.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Sets the bearing, normalized.
    pub fn set_bearing(&mut self, bearing: f64) {
        self.bearing = normalize_bearing(bearing);
    }

    /// Sets the pitch, clamped.
    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch.clamp(0.0, MAX_PITCH);
    }

    /// Sets the padding.
    pub fn set_padding(&mut self, padding: EdgeInsets) {
        self.padding = padding;
    }

    fn padded_center(&self) -> Point {
        self.padding
            .center(self.size.width, self.size.height)
            .to_point()
    }

    // World pixels at the current zoom to screen.
    fn to_screen(&self) -> Affine {
        Affine::translate(self.padded_center().to_vec2())
            * Affine::rotate((self.north.angle() - self.bearing).to_radians())
            * Affine::translate(-project(self.center, self.zoom).to_vec2())
    }

    /// Screen position of `lat_lng`.
    #[must_use]
    pub fn pixel_for(&self, lat_lng: LatLng) -> ScreenCoordinate {
        (self.to_screen() * project(lat_lng, self.zoom)).into()
    }

    /// Coordinate under the screen point `pixel`.
    #[must_use]
    pub fn lat_lng_for(&self, pixel: ScreenCoordinate) -> LatLng {
        unproject(self.to_screen().inverse() * pixel.to_point(), self.zoom)
    }

    /// Pans so that content moves by `delta` on screen.
    pub fn move_by(&mut self, delta: Vec2) {
        let target = self.padded_center() - delta;
        self.set_center(self.lat_lng_for(target.into()));
    }

    /// Moves the camera so that `lat_lng` lands on `pixel`.
    fn pin(&mut self, lat_lng: LatLng, pixel: Point) {
        let now = self.pixel_for(lat_lng).to_point();
        self.move_by(pixel - now);
    }

    /// Zooms by `scale` keeping the coordinate under `anchor` fixed.
    pub fn scale_by(&mut self, scale: f64, anchor: Option<ScreenCoordinate>) {
        let zoom = self.zoom + scale.log2();
        match anchor {
            Some(anchor) => {
                let fixed = self.lat_lng_for(anchor);
                self.set_zoom(zoom);
                self.pin(fixed, anchor.to_point());
            }
            None => self.set_zoom(zoom),
        }
    }

    /// Rotates by the angle swept from `first` to `second` around the padded
    /// center. Dragging clockwise rotates the map clockwise.
    pub fn rotate_by(&mut self, first: ScreenCoordinate, second: ScreenCoordinate) {
        let c = self.padded_center();
        let a = (first.to_point() - c).atan2();
        let b = (second.to_point() - c).atan2();
        self.set_bearing(self.bearing - (b - a).to_degrees());
    }

    /// Tilts by `delta` degrees.
    pub fn pitch_by(&mut self, delta: f64) {
        self.set_pitch(self.pitch + delta);
    }

    /// Applies the fields set in `camera`.
    ///
    /// With an anchor, zoom and bearing change around the anchor's coordinate
    /// instead of the center.
    pub fn jump_to(&mut self, camera: &CameraOptions) {
        if let Some(padding) = camera.padding {
            self.padding = padding;
        }
        let fixed = camera.anchor.map(|a| (self.lat_lng_for(a), a.to_point()));
        if let Some(center) = camera.center {
            self.set_center(center);
        }
        if let Some(zoom) = camera.zoom {
            self.set_zoom(zoom);
        }
        if let Some(bearing) = camera.bearing {
            self.set_bearing(bearing);
        }
        if let Some(pitch) = camera.pitch {
            self.set_pitch(pitch);
        }
        if let Some((lat_lng, pixel)) = fixed {
            self.pin(lat_lng, pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn viewport() -> Transform {
        Transform::new(Size::new(400.0, 300.0))
    }

    #[test]
    fn projection_round_trips() {
        let ll = LatLng::new(52.52, 13.405);
        let back = unproject(project(ll, 7.5), 7.5);
        assert!(close(back.latitude, ll.latitude), "lat {back:?}");
        assert!(close(back.longitude, ll.longitude), "lng {back:?}");
        assert_eq!(
            project(LatLng::default(), 0.0),
            Point::new(256.0, 256.0),
            "origin at world center"
        );
    }

    #[test]
    fn clamps_and_normalizes() {
        let mut t = viewport();
        t.set_zoom(30.0);
        t.set_pitch(-5.0);
        t.set_bearing(540.0);
        t.set_center(LatLng::new(89.0, 190.0));
        assert_eq!(t.zoom(), MAX_ZOOM, "zoom clamp");
        assert_eq!(t.pitch(), 0.0, "pitch clamp");
        assert!(close(t.bearing(), 180.0), "bearing {}", t.bearing());
        assert!(close(t.center().latitude, MAX_LATITUDE), "lat clamp");
        assert!(close(t.center().longitude, -170.0), "lng wrap");
        assert!(close(normalize_bearing(-180.0), 180.0), "(-180, 180]");
    }

    #[test]
    fn center_projects_to_viewport_center() {
        let mut t = viewport();
        t.jump_to(&CameraOptions::centered(LatLng::new(40.0, -74.0), 10.0).with_bearing(30.0));
        let p = t.pixel_for(LatLng::new(40.0, -74.0));
        assert!(close(p.x, 200.0) && close(p.y, 150.0), "center at {p:?}");
        let ll = t.lat_lng_for(ScreenCoordinate::new(200.0, 150.0));
        assert!(close(ll.latitude, 40.0), "unproject center {ll:?}");
    }

    #[test]
    fn padding_shifts_the_center() {
        let mut t = viewport();
        t.jump_to(&CameraOptions::default().with_padding(EdgeInsets::new(0.0, 100.0, 0.0, 0.0)));
        let p = t.pixel_for(t.center());
        assert!(close(p.x, 250.0), "padded center x {}", p.x);
    }

    #[test]
    fn anchored_zoom_keeps_anchor_fixed() {
        let mut t = viewport();
        t.jump_to(&CameraOptions::centered(LatLng::new(10.0, 10.0), 4.0));
        let anchor = ScreenCoordinate::new(50.0, 60.0);
        let before = t.lat_lng_for(anchor);
        t.scale_by(4.0, Some(anchor));
        assert!(close(t.zoom(), 6.0), "two levels in");
        let after = t.lat_lng_for(anchor);
        assert!(
            close(before.latitude, after.latitude) && close(before.longitude, after.longitude),
            "{before:?} vs {after:?}"
        );
    }

    #[test]
    fn move_by_drags_content() {
        let mut t = viewport();
        t.jump_to(&CameraOptions::centered(LatLng::default(), 3.0));
        let spot = LatLng::new(5.0, 5.0);
        let before = t.pixel_for(spot);
        t.move_by(Vec2::new(30.0, -20.0));
        let after = t.pixel_for(spot);
        assert!(close(after.x - before.x, 30.0), "x moved");
        assert!(close(after.y - before.y, -20.0), "y moved");
    }

    #[test]
    fn rotate_by_follows_the_drag() {
        let mut t = viewport();
        t.rotate_by(ScreenCoordinate::new(300.0, 150.0), ScreenCoordinate::new(200.0, 250.0));
        assert!(close(t.bearing(), -90.0), "quarter turn, got {}", t.bearing());
    }

    #[test]
    fn north_orientation_turns_the_screen() {
        let center = LatLng::new(0.0, 0.0);
        let north_of_center = LatLng::new(1.0, 0.0);
        let cases = [
            (NorthOrientation::Upwards, (0.0, -1.0)),
            (NorthOrientation::Rightwards, (1.0, 0.0)),
            (NorthOrientation::Downwards, (0.0, 1.0)),
            (NorthOrientation::Leftwards, (-1.0, 0.0)),
        ];
        for (north, (dx, dy)) in cases {
            let mut t = viewport().with_north_orientation(north);
            t.jump_to(&CameraOptions::centered(center, 4.0));
            let c = t.pixel_for(center);
            let n = t.pixel_for(north_of_center);
            let dir = (n.to_point() - c.to_point()).normalize();
            assert!(close(dir.x, dx) && close(dir.y, dy), "{north:?}: {dir:?}");
            assert!(close(t.bearing(), 0.0), "bearing untouched");
            let back = t.lat_lng_for(n);
            assert!(close(back.latitude, 1.0), "{north:?} inverts: {back:?}");
        }
    }
}
