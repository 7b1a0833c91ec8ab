// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu renderer backends for Mapbridge.
//!
//! [`WgpuBackend`] turns a host window into a wgpu surface and implements
//! [`RendererBackend`](mapbridge_core::backend::RendererBackend). Two variants
//! share the type and differ only in the instance backends:
//!
//! - [`GraphicsApi::Native`]: Vulkan, Metal or DX12, whichever the platform
//!   provides.
//! - [`GraphicsApi::Gles`]: OpenGL ES through EGL on Linux and Android, or
//!   through ANGLE on Windows and macOS with the `angle` feature.
//!
//! The default is chosen at build time by the `gles` feature, so higher layers
//! stay API-agnostic:
//!
//! ```rust,ignore
//! let backend = WgpuBackend::new(window.clone(), width, height, scale)?;
//! let frontend = RendererFrontend::new(backend, scale)?;
//! ```
//!
//! Native renderers downcast the backend through
//! [`as_any_mut`](mapbridge_core::backend::RendererBackend::as_any_mut) to
//! reach the device, queue and acquired frame view.

mod api;
mod backend;

pub use api::GraphicsApi;
pub use backend::WgpuBackend;
