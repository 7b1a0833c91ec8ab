// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless renderer.
//!
//! Draws a flat approximation of a frame: the style background, debug
//! overlays as tints and tile borders, and a statistics box. Enough to prove a
//! frame reached the framebuffer and what state it was prepared from.

use mapbridge_core::backend::RendererBackend;
use mapbridge_core::debug::MapDebugOptions;
use mapbridge_core::engine::{FrameParams, NativeRenderer, RenderReport};
use mapbridge_core::error::RenderError;
use mapbridge_core::observer::{RenderFrameStatus, RenderMode};
use mapbridge_core::surface::PhysicalSize;
use mapbridge_core::CameraOptions;

use crate::backend::{HeadlessBackend, Rgba8};
use crate::transform::{TILE_SIZE, project};

/// Everything the headless renderer needs for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessFrame {
    /// Camera when the frame was prepared.
    pub camera: CameraOptions,
    /// Viewport size in physical pixels.
    pub size: PhysicalSize,
    /// Clear colour.
    pub background: Rgba8,
    /// Debug overlays.
    pub debug: MapDebugOptions,
    /// Draw the statistics box.
    pub stats_view: bool,
    /// A style or tiles are still loading.
    pub loading: bool,
    /// A camera animation is running.
    pub animating: bool,
    /// First frame of a newly loaded style.
    pub map_started: bool,
    /// The map is complete and has not yet been reported as such.
    pub report_finish: bool,
}

/// Renders [`HeadlessFrame`]s into a [`HeadlessBackend`].
///
/// Other backends are accepted; frames are then reported but not drawn.
#[derive(Debug)]
pub struct HeadlessRenderer {
    pixel_ratio: f32,
    frames: u64,
}

impl HeadlessRenderer {
    /// Creates a renderer for `pixel_ratio`.
    #[must_use]
    pub fn new(pixel_ratio: f32) -> Self {
        Self {
            pixel_ratio,
            frames: 0,
        }
    }

    /// Frames rendered so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl NativeRenderer for HeadlessRenderer {
    fn render(
        &mut self,
        backend: &mut dyn RendererBackend,
        params: &FrameParams,
    ) -> Result<RenderReport, RenderError> {
        let frame = params
            .downcast_ref::<HeadlessFrame>()
            .ok_or_else(|| RenderError::Renderer("frame prepared by another engine".into()))?;
        let size = backend.size();
        let matches = frame.size == size;
        if !matches {
            tracing::debug!(
                prepared = %frame.size,
                surface = %size,
                "frame size differs from surface"
            );
        }
        if let Some(headless) = backend.as_any_mut().downcast_mut::<HeadlessBackend>() {
            draw(headless.back_buffer_mut(), size, frame, self.pixel_ratio);
        }
        self.frames += 1;

        let complete = matches && !frame.loading;
        Ok(RenderReport {
            status: RenderFrameStatus {
                mode: if complete {
                    RenderMode::Full
                } else {
                    RenderMode::Partial
                },
                needs_repaint: frame.loading || frame.animating,
                placement_changed: frame.map_started,
            },
            map_started: frame.map_started,
            map_finished: (complete && frame.report_finish).then_some(RenderMode::Full),
        })
    }
}

fn overlay_color(flag: MapDebugOptions) -> Option<Rgba8> {
    let color = match flag {
        f if f == MapDebugOptions::PARSE_STATUS => Rgba8::new(0, 200, 0, 255),
        f if f == MapDebugOptions::TIMESTAMPS => Rgba8::new(0, 0, 220, 255),
        f if f == MapDebugOptions::COLLISION => Rgba8::new(220, 0, 0, 255),
        f if f == MapDebugOptions::OVERDRAW => Rgba8::new(220, 0, 220, 255),
        f if f == MapDebugOptions::STENCIL_CLIP => Rgba8::new(220, 220, 0, 255),
        f if f == MapDebugOptions::DEPTH_BUFFER => Rgba8::new(128, 128, 128, 255),
        _ => return None,
    };
    Some(color)
}

fn draw(buf: &mut [Rgba8], size: PhysicalSize, frame: &HeadlessFrame, pixel_ratio: f32) {
    buf.fill(frame.background);
    for flag in frame.debug.iter() {
        if let Some(color) = overlay_color(flag) {
            for px in buf.iter_mut() {
                *px = px.blend(color, 64);
            }
        }
    }
    let width = size.width as usize;
    if frame.debug.contains(MapDebugOptions::TILE_BORDERS) {
        draw_tile_borders(buf, width, frame, pixel_ratio);
    }
    if frame.stats_view {
        let ratio = f64::from(pixel_ratio);
        let box_w = to_px(64.0 * ratio).min(width);
        let box_h = to_px(24.0 * ratio);
        for row in buf.chunks_mut(width.max(1)).take(box_h) {
            for px in &mut row[..box_w] {
                *px = px.blend(Rgba8::BLACK, 192);
            }
        }
    }
}

fn to_px(v: f64) -> usize {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "overlay extents are small positive pixel counts"
    )]
    let px = v.max(0.0) as usize;
    px
}

// Lines where the integer-zoom tile index changes, ignoring bearing.
fn draw_tile_borders(buf: &mut [Rgba8], width: usize, frame: &HeadlessFrame, pixel_ratio: f32) {
    let (Some(center), Some(zoom)) = (frame.camera.center, frame.camera.zoom) else {
        return;
    };
    if width == 0 {
        return;
    }
    let ratio = f64::from(pixel_ratio);
    let tile = TILE_SIZE * (zoom - zoom.floor()).exp2();
    let origin = project(center, zoom);
    let height = buf.len() / width;
    let half_w = width as f64 / ratio / 2.0;
    let half_h = height as f64 / ratio / 2.0;
    let world_x = |x: usize| origin.x + x as f64 / ratio - half_w;
    let world_y = |y: usize| origin.y + y as f64 / ratio - half_h;
    let border = Rgba8::new(255, 0, 0, 255);
    for (y, row) in buf.chunks_mut(width).enumerate() {
        let horizontal =
            y > 0 && (world_y(y) / tile).floor() != (world_y(y - 1) / tile).floor();
        for (x, px) in row.iter_mut().enumerate() {
            let vertical = x > 0 && (world_x(x) / tile).floor() != (world_x(x - 1) / tile).floor();
            if horizontal || vertical {
                *px = border;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mapbridge_core::LatLng;

    use super::*;

    fn frame(size: PhysicalSize) -> HeadlessFrame {
        HeadlessFrame {
            camera: CameraOptions::centered(LatLng::default(), 1.0),
            size,
            background: Rgba8::new(10, 20, 30, 255),
            debug: MapDebugOptions::NO_DEBUG,
            stats_view: false,
            loading: false,
            animating: false,
            map_started: true,
            report_finish: true,
        }
    }

    fn render(
        backend: &mut HeadlessBackend,
        frame: HeadlessFrame,
    ) -> Result<RenderReport, RenderError> {
        let size = frame.size;
        let mut renderer = HeadlessRenderer::new(1.0);
        backend.activate().unwrap();
        let report = renderer.render(backend, &FrameParams::new(frame, size));
        backend.swap().unwrap();
        backend.deactivate();
        report
    }

    #[test]
    fn clears_to_background_and_reports_full() {
        let mut backend = HeadlessBackend::new(64, 32, 1.0).unwrap();
        let report = render(&mut backend, frame(PhysicalSize::new(64, 32))).unwrap();
        assert_eq!(backend.pixel(5, 5), Some(Rgba8::new(10, 20, 30, 255)), "background");
        assert_eq!(report.status.mode, RenderMode::Full, "complete frame");
        assert!(report.map_started, "first frame flagged");
        assert_eq!(report.map_finished, Some(RenderMode::Full), "finished");
        assert!(!report.status.needs_repaint, "settled");
    }

    #[test]
    fn stale_size_is_partial() {
        let mut backend = HeadlessBackend::new(64, 32, 1.0).unwrap();
        let report = render(&mut backend, frame(PhysicalSize::new(32, 32))).unwrap();
        assert_eq!(report.status.mode, RenderMode::Partial, "size mismatch");
        assert_eq!(report.map_finished, None, "not finished");
    }

    #[test]
    fn loading_requests_repaint() {
        let mut backend = HeadlessBackend::new(8, 8, 1.0).unwrap();
        let mut f = frame(PhysicalSize::new(8, 8));
        f.loading = true;
        let report = render(&mut backend, f).unwrap();
        assert!(report.status.needs_repaint, "keep drawing while loading");
        assert_eq!(report.status.mode, RenderMode::Partial, "partial");
    }

    #[test]
    fn overlays_tint_the_frame() {
        let mut backend = HeadlessBackend::new(128, 128, 1.0).unwrap();
        let mut f = frame(PhysicalSize::new(128, 128));
        f.debug = MapDebugOptions::COLLISION;
        f.stats_view = true;
        render(&mut backend, f).unwrap();
        let tinted = backend.pixel(100, 100).unwrap();
        assert!(tinted.r > 10, "collision tint adds red: {tinted:?}");
        let stats = backend.pixel(1, 1).unwrap();
        assert!(stats.r < tinted.r, "stats box darkens: {stats:?}");
    }

    #[test]
    fn foreign_params_are_rejected() {
        let mut backend = HeadlessBackend::new(8, 8, 1.0).unwrap();
        let mut renderer = HeadlessRenderer::new(1.0);
        let params = FrameParams::new(42_u32, PhysicalSize::new(8, 8));
        assert!(renderer.render(&mut backend, &params).is_err(), "wrong payload");
    }
}
