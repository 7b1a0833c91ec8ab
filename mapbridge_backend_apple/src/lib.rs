// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Metal layer renderer backend for Mapbridge.
//!
//! [`MetalLayerBackend`] creates a `CAMetalLayer`, adds it to the layer tree
//! of the `NSView` behind an AppKit window handle, and keeps its drawable
//! size and contents scale in sync with the map surface. Core Animation
//! composites the layer on its own, so [`swap`] is a no-op and
//! [`presents_implicitly`] returns `true`.
//!
//! Native renderers reach the layer through
//! [`as_any_mut`](mapbridge_core::backend::RendererBackend::as_any_mut) and
//! [`MetalLayerBackend::layer`], or hand [`MetalLayerBackend::as_raw`] to an
//! external renderer such as wgpu's `SurfaceTargetUnsafe::CoreAnimationLayer`.
//!
//! [`swap`]: mapbridge_core::backend::RendererBackend::swap
//! [`presents_implicitly`]: mapbridge_core::backend::RendererBackend::presents_implicitly

#![expect(unsafe_code, reason = "reading the NSView out of a raw window handle requires unsafe")]

mod metal;

pub use metal::MetalLayerBackend;
