// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic map engine for tests, demos and headless hosts.
//!
//! [`HeadlessEngine`] implements the [`MapEngine`](mapbridge_core::MapEngine)
//! seam without a GPU. Its maps keep a real Web Mercator camera, parse the
//! structural part of style documents, and simulate tile loading one run-loop
//! turn per source, so the full event sequence of a style load can be
//! observed:
//!
//! ```text
//! will_start_loading_map
//!   └─ did_finish_loading_style (+ style_image_missing)
//!        └─ tiles arrive, one turn per source
//!             └─ did_finish_rendering_map(Full)
//!                  └─ did_finish_loading_map
//!                       └─ did_become_idle
//! ```
//!
//! Frames are drawn by [`HeadlessRenderer`] into a [`HeadlessBackend`]
//! framebuffer. Styles are fetched through a [`ResourceLoader`]; animations
//! run on a [`Clock`], and [`ManualClock`] makes them step deterministically.

pub mod animation;
pub mod backend;
pub mod clock;
pub mod engine;
pub mod loader;
pub mod map;
pub mod observer;
pub mod renderer;
pub mod style;
pub mod transform;

pub use backend::{HeadlessBackend, Rgba8};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::HeadlessEngine;
pub use loader::{
    CompositeLoader, FileLoader, LoadError, MemoryLoader, ResourceLoader, ThreadedLoader,
};
pub use map::HeadlessMap;
pub use observer::{EventLog, RecordingObserver};
pub use renderer::{HeadlessFrame, HeadlessRenderer};
pub use style::Style;
pub use transform::Transform;
