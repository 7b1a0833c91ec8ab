// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Embedding protocol for a native GPU map renderer.
//!
//! `mapbridge_core` sits between a host (a Rust application, or a
//! garbage-collected runtime reaching in over `mapbridge_ffi`) and an opaque
//! map engine. It owns the parts of the embedding that every host needs and
//! no engine provides: releasing native objects exactly once, pumping the
//! engine's asynchronous callbacks on the right thread, deciding when to
//! draw, and delivering events to host code that may misbehave.
//!
//! # Architecture
//!
//! ```text
//!   host timer ──► Map::tick() ──► RendererFrontend::tick()
//!                                      │
//!                    ┌─────────────────┤
//!                    ▼                 ▼
//!            RunLoop::run_once()   dirty? ──► NativeRenderer::render()
//!                    │                              │
//!                    ▼                              ▼
//!   NativeMap (engine) ──update(params)──►   RendererBackend::swap()
//!        │
//!        ▼
//!   ObserverBridge::notify() ──► host MapObserver
//! ```
//!
//! **[`handle`]** — [`NativeHandle`] releases a native object exactly once,
//! on `destroy` or drop. [`HandleTable`] hands out generational references
//! for hosts that can only hold integers.
//!
//! **[`run_loop`]** — One cooperative [`RunLoop`] per thread. Engine worker
//! threads post back to it through a [`RemoteScheduler`] or a mailbox.
//!
//! **[`backend`]** — The [`RendererBackend`] contract that platform surface
//! crates implement.
//!
//! **[`frontend`]** — [`RendererFrontend`] tracks the dirty flag and the
//! latest frame parameters and drives the backend.
//!
//! **[`observer`]** — [`MapObserver`] events and the [`ObserverBridge`]
//! that contains listener panics.
//!
//! **[`map`]** — The [`Map`] facade: style, camera, gestures, projection and
//! debug overlays.
//!
//! **[`engine`]** and **[`library`]** — The traits an engine implements and
//! the process-wide slot it is installed into.
//!
//! The remaining modules hold plain values: [`camera`], [`options`],
//! [`debug`], [`surface`] and [`error`].
//!
//! # Threading
//!
//! Everything except [`RemoteScheduler`] and
//! [`MailboxSender`](run_loop::MailboxSender) is `!Send` and stays on the
//! thread that created its run loop.

pub mod backend;
pub mod camera;
pub mod debug;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod handle;
pub mod library;
pub mod map;
pub mod observer;
pub mod options;
pub mod run_loop;
pub mod surface;

pub use backend::RendererBackend;
pub use camera::{AnimationOptions, CameraOptions, EdgeInsets, LatLng, ScreenCoordinate};
pub use debug::MapDebugOptions;
pub use engine::{FrameParams, MapContext, MapEngine, NativeMap, NativeRenderer, RenderReport};
pub use error::{Error, Result};
pub use frontend::{FrameParamsId, RendererBinding, RendererFrontend, UpdateSink};
pub use handle::{HandleTable, NativeHandle, NativeRef};
pub use map::Map;
pub use observer::{MapEvent, MapObserver, ObserverBridge, RendererObserver};
pub use options::{ClientOptions, MapConfig, MapOptions, ResourceOptions, TileServerOptions};
pub use run_loop::{RemoteScheduler, RunLoop, Scheduler};
pub use surface::{PhysicalSize, SurfaceDescriptor, SurfaceKind};
