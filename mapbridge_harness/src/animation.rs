// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Camera transitions.

use std::time::Duration;

use kurbo::Point;
use mapbridge_core::{CameraOptions, EdgeInsets};

use crate::transform::{Transform, normalize_bearing, project, unproject};

/// A cubic bezier timing curve through (0, 0) and (1, 1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitBezier {
    cx: f64,
    bx: f64,
    ax: f64,
    cy: f64,
    by: f64,
    ay: f64,
}

impl UnitBezier {
    /// The default camera ease.
    pub const EASE: Self = Self::new(0.0, 0.0, 0.25, 1.0);

    /// A curve with control points `(x1, y1)` and `(x2, y2)`.
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        Self {
            cx,
            bx,
            ax: 1.0 - cx - bx,
            cy,
            by,
            ay: 1.0 - cy - by,
        }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_x(&self, x: f64) -> f64 {
        const EPSILON: f64 = 1e-6;
        let mut t = x;
        for _ in 0..8 {
            let err = self.sample_x(t) - x;
            if err.abs() < EPSILON {
                return t;
            }
            let d = self.sample_dx(t);
            if d.abs() < EPSILON {
                break;
            }
            t -= err / d;
        }
        // Newton stalled; fall back to bisection.
        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        while lo < hi {
            let v = self.sample_x(t);
            if (v - x).abs() < EPSILON {
                break;
            }
            if x > v {
                lo = t;
            } else {
                hi = t;
            }
            t = (hi - lo) / 2.0 + lo;
            if hi - lo < EPSILON {
                break;
            }
        }
        t
    }

    /// Eased progress for linear progress `x` in `[0, 1]`.
    #[must_use]
    pub fn solve(&self, x: f64) -> f64 {
        self.sample_y(self.solve_x(x.clamp(0.0, 1.0)))
    }
}

/// The path an animation follows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Path {
    /// Straight interpolation of every property.
    Ease,
    /// Zooms out by up to `arc` levels mid-flight.
    Fly {
        /// Extra zoom-out at the midpoint.
        arc: f64,
    },
}

/// A running camera transition.
#[derive(Clone, Debug)]
pub struct Animation {
    start: Duration,
    duration: Duration,
    from: Transform,
    to: Transform,
    path: Path,
}

impl Animation {
    /// Starts a transition at `now` from `from` to `from` with `target`
    /// applied.
    #[must_use]
    pub fn new(
        now: Duration,
        duration: Duration,
        from: Transform,
        target: &CameraOptions,
        fly: bool,
    ) -> Self {
        let mut to = from;
        to.jump_to(target);
        let path = if fly {
            Path::Fly {
                arc: zoom_arc(&from, &to),
            }
        } else {
            Path::Ease
        };
        Self {
            start: now,
            duration,
            from,
            to,
            path,
        }
    }

    /// The path this animation follows.
    #[must_use]
    pub fn path(&self) -> Path {
        self.path
    }

    /// Where the animation ends.
    #[must_use]
    pub fn target(&self) -> &Transform {
        &self.to
    }

    /// Camera at `now` and whether the animation has finished.
    #[must_use]
    pub fn sample(&self, now: Duration) -> (Transform, bool) {
        let elapsed = now.saturating_sub(self.start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let x = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let k = UnitBezier::EASE.solve(x);
        (self.interpolate(k), false)
    }

    fn interpolate(&self, k: f64) -> Transform {
        let (a, b) = (&self.from, &self.to);
        let mut t = *a;
        let center = lerp_point(project(a.center(), 0.0), project(b.center(), 0.0), k);
        t.set_center(unproject(center, 0.0));
        let mut zoom = lerp(a.zoom(), b.zoom(), k);
        if let Path::Fly { arc } = self.path {
            zoom -= arc * 4.0 * k * (1.0 - k);
        }
        t.set_zoom(zoom);
        let turn = normalize_bearing(b.bearing() - a.bearing());
        t.set_bearing(a.bearing() + turn * k);
        t.set_pitch(lerp(a.pitch(), b.pitch(), k));
        t.set_padding(lerp_insets(a.padding(), b.padding(), k));
        t
    }
}

fn lerp(a: f64, b: f64, k: f64) -> f64 {
    a + (b - a) * k
}

fn lerp_point(a: Point, b: Point, k: f64) -> Point {
    a.lerp(b, k)
}

fn lerp_insets(a: EdgeInsets, b: EdgeInsets, k: f64) -> EdgeInsets {
    EdgeInsets::new(
        lerp(a.top, b.top, k),
        lerp(a.left, b.left, k),
        lerp(a.bottom, b.bottom, k),
        lerp(a.right, b.right, k),
    )
}

// Zoom levels to back out so both endpoints share the viewport mid-flight.
fn zoom_arc(from: &Transform, to: &Transform) -> f64 {
    let zoom = from.zoom().min(to.zoom());
    let distance = (project(from.center(), zoom) - project(to.center(), zoom)).hypot();
    let span = from.size().width.max(from.size().height).max(1.0);
    (distance / span).log2().max(0.0)
}
