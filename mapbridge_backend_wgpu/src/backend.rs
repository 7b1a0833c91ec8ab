// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`RendererBackend`] drawing into a window through wgpu.

use core::any::Any;
use core::fmt;

use mapbridge_core::backend::RendererBackend;
use mapbridge_core::error::SurfaceError;
use mapbridge_core::surface::{PhysicalSize, SurfaceDescriptor};

use crate::api::GraphicsApi;

/// The surface texture acquired by [`activate`](RendererBackend::activate).
struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// A wgpu surface over a host window plus the device that draws into it.
///
/// The same type serves both the platform-native API and GLES; the
/// [`GraphicsApi`] passed at construction picks the instance backends.
/// Frames follow the usual wgpu cycle: `activate` acquires the current
/// surface texture, the native renderer records into [`view`](Self::view),
/// and `swap` presents it.
pub struct WgpuBackend {
    descriptor: SurfaceDescriptor,
    api: GraphicsApi,
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    frame: Option<Frame>,
}

impl fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("descriptor", &self.descriptor)
            .field("api", &self.api)
            .field("format", &self.config.format)
            .field("active", &self.frame.is_some())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Creates a surface over `window` with the [default](GraphicsApi::default)
    /// graphics API.
    ///
    /// # Errors
    ///
    /// As [`with_api`](Self::with_api).
    pub fn new<W>(
        window: W,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self, SurfaceError>
    where
        W: wgpu::WindowHandle + 'static,
    {
        Self::with_api(window, width, height, pixel_ratio, GraphicsApi::default())
    }

    /// Creates a surface over `window` using `api`.
    ///
    /// The window is moved into the surface and kept alive by it; pass an
    /// `Arc` to share it with the host.
    ///
    /// # Errors
    ///
    /// - [`SurfaceError::NotRealized`] if either dimension is zero. The window
    ///   is not touched in that case.
    /// - [`SurfaceError::Unsupported`] if the handle is unavailable or `api`
    ///   cannot drive its window system.
    /// - [`SurfaceError::Creation`] if no adapter, device or surface
    ///   configuration is available.
    pub fn with_api<W>(
        window: W,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        api: GraphicsApi,
    ) -> Result<Self, SurfaceError>
    where
        W: wgpu::WindowHandle + 'static,
    {
        if width == 0 || height == 0 {
            return Err(SurfaceError::NotRealized { width, height });
        }
        let descriptor = SurfaceDescriptor::from_window(&window, width, height, pixel_ratio)?;
        api.check(descriptor.kind())?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: api.backends(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| SurfaceError::Creation(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| SurfaceError::Creation(format!("no {api} adapter for this surface")))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mapbridge"),
                ..Default::default()
            },
            None,
        ))
        .map_err(|e| SurfaceError::Creation(e.to_string()))?;

        let config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| SurfaceError::Creation("surface not compatible with adapter".into()))?;
        surface.configure(&device, &config);

        tracing::debug!(
            %api,
            kind = ?descriptor.kind(),
            size = %descriptor.size(),
            adapter = %adapter.get_info().name,
            format = ?config.format,
            "wgpu surface created"
        );

        Ok(Self {
            descriptor,
            api,
            surface,
            adapter,
            device,
            queue,
            config,
            frame: None,
        })
    }

    /// The graphics API in use.
    #[must_use]
    pub fn api(&self) -> GraphicsApi {
        self.api
    }

    /// The adapter the device was created on.
    #[must_use]
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// The device renderers record with.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue renderers submit to.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The surface's texture format.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// The view of the acquired frame, between `activate` and `deactivate`.
    #[must_use]
    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.frame.as_ref().map(|f| &f.view)
    }

    /// Clears the acquired frame to `color`.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::Frame`] outside an `activate`/`deactivate` bracket.
    pub fn clear(&self, color: wgpu::Color) -> Result<(), SurfaceError> {
        let view = self
            .view()
            .ok_or_else(|| SurfaceError::Frame("no frame acquired".into()))?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mapbridge clear"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mapbridge clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn reconfigure(&mut self) {
        let size = self.descriptor.size();
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }
}

impl RendererBackend for WgpuBackend {
    fn surface(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    fn resize(&mut self, size: PhysicalSize) -> Result<bool, SurfaceError> {
        if !self.descriptor.resize(size)? {
            return Ok(false);
        }
        // A frame acquired at the old size must not be presented.
        self.frame = None;
        self.reconfigure();
        tracing::debug!(api = %self.api, %size, "wgpu surface resized");
        Ok(true)
    }

    fn activate(&mut self) -> Result<(), SurfaceError> {
        if self.frame.is_some() {
            return Err(SurfaceError::Frame("frame already acquired".into()));
        }
        let texture = match self.acquire() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                tracing::debug!(api = %self.api, "surface outdated, reconfiguring");
                self.reconfigure();
                self.acquire()
                    .map_err(|e| SurfaceError::Frame(e.to_string()))?
            }
            Err(e) => return Err(SurfaceError::Frame(e.to_string())),
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.frame = Some(Frame { texture, view });
        Ok(())
    }

    fn deactivate(&mut self) {
        // Dropping an unpresented texture discards it.
        self.frame = None;
    }

    fn swap(&mut self) -> Result<(), SurfaceError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| SurfaceError::Frame("nothing to present".into()))?;
        drop(frame.view);
        frame.texture.present();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
