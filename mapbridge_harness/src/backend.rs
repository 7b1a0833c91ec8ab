// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offscreen backend with a CPU framebuffer.

use std::any::Any;
use std::fmt;

use bytemuck::{Pod, Zeroable};
use mapbridge_core::backend::RendererBackend;
use mapbridge_core::error::SurfaceError;
use mapbridge_core::surface::{PhysicalSize, SurfaceDescriptor};

/// One 8-bit RGBA pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Rgba8 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Creates a pixel.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Blends `over` onto `self` at `alpha` out of 255.
    #[must_use]
    pub fn blend(self, over: Self, alpha: u8) -> Self {
        let mix = |a: u8, b: u8| {
            let k = u16::from(alpha);
            let v = (u16::from(a) * (255 - k) + u16::from(b) * k) / 255;
            u8::try_from(v).unwrap_or(u8::MAX)
        };
        Self::new(mix(self.r, over.r), mix(self.g, over.g), mix(self.b, over.b), self.a)
    }
}

/// A framebuffer-backed [`RendererBackend`] for tests and headless hosts.
///
/// Keeps a back buffer the renderer draws into and a front buffer that
/// [`swap`](RendererBackend::swap) publishes. Counts framebuffer
/// allocations, activations and presented frames.
pub struct HeadlessBackend {
    surface: SurfaceDescriptor,
    back: Vec<Rgba8>,
    front: Vec<Rgba8>,
    active: bool,
    allocations: u64,
    activations: u64,
    presents: u64,
}

impl fmt::Debug for HeadlessBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessBackend")
            .field("surface", &self.surface)
            .field("allocations", &self.allocations)
            .field("activations", &self.activations)
            .field("presents", &self.presents)
            .finish_non_exhaustive()
    }
}

fn pixel_count(size: PhysicalSize) -> usize {
    usize::try_from(size.area()).unwrap_or(usize::MAX)
}

impl HeadlessBackend {
    /// Creates a `width` by `height` framebuffer.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::NotRealized`] for a zero dimension,
    /// [`SurfaceError::InvalidPixelRatio`] for a bad ratio.
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Result<Self, SurfaceError> {
        let surface = SurfaceDescriptor::offscreen(width, height, pixel_ratio)?;
        let mut backend = Self {
            surface,
            back: Vec::new(),
            front: Vec::new(),
            active: false,
            allocations: 0,
            activations: 0,
            presents: 0,
        };
        backend.allocate();
        Ok(backend)
    }

    fn allocate(&mut self) {
        let n = pixel_count(self.surface.size());
        self.back = vec![Rgba8::default(); n];
        self.front = vec![Rgba8::default(); n];
        self.allocations += 1;
        tracing::trace!(size = %self.surface.size(), "framebuffer allocated");
    }

    /// Number of framebuffer allocations, including the initial one.
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Number of frames brackets opened.
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Number of frames presented.
    #[must_use]
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Whether a frame is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The buffer being drawn, row-major.
    pub fn back_buffer_mut(&mut self) -> &mut [Rgba8] {
        &mut self.back
    }

    /// The last presented frame, row-major.
    #[must_use]
    pub fn front_buffer(&self) -> &[Rgba8] {
        &self.front
    }

    /// The last presented frame as raw RGBA bytes.
    #[must_use]
    pub fn front_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.front)
    }

    /// Presented pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        let size = self.surface.size();
        if x >= size.width || y >= size.height {
            return None;
        }
        let index = usize::try_from(u64::from(y) * u64::from(size.width) + u64::from(x)).ok()?;
        self.front.get(index).copied()
    }
}

impl RendererBackend for HeadlessBackend {
    fn surface(&self) -> &SurfaceDescriptor {
        &self.surface
    }

    fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
        let changed = self.surface.resize(size)?;
        if changed {
            self.allocate();
        }
        Ok(changed)
    }

    fn activate(&mut self) -> Result<(), SurfaceError> {
        if self.active {
            return Err(SurfaceError::Frame("frame already active".into()));
        }
        self.active = true;
        self.activations += 1;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn swap(&mut self) -> Result<(), SurfaceError> {
        if !self.active {
            return Err(SurfaceError::Frame("swap outside a frame".into()));
        }
        std::mem::swap(&mut self.back, &mut self.front);
        self.presents += 1;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
