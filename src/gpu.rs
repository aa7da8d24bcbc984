//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu surface, device, queue, and surface
//! configuration, and is passed by reference to everything that talks to
//! the GPU. It must exist before any resource wrapper is constructed;
//! wrapper constructors take `&GpuContext`, so the type system enforces
//! the initialization order the driver requires.

use std::sync::Arc;
use winit::window::Window;

/// Core GPU context holding wgpu resources.
///
/// All fields are public so callers can reach the raw wgpu API when the
/// engine's surface area is not enough.
pub struct GpuContext {
    /// The surface frames are presented to.
    pub surface: wgpu::Surface<'static>,
    /// The logical device used to create resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue work is submitted through.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Creates a GPU context from a winit window.
    ///
    /// Picks an sRGB surface format where available and configures the
    /// surface with Fifo presentation.
    ///
    /// # Panics
    ///
    /// Panics if no suitable adapter is found or device creation fails.
    /// These are unrecoverable machine-level failures.
    pub fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).unwrap();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("Failed to find a suitable GPU adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Pharos Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "gpu context ready: {}x{} {:?}",
            size.width,
            size.height,
            surface_format
        );

        Self {
            surface,
            device,
            queue,
            config,
        }
    }

    /// Resizes the surface. Zero dimensions are ignored so a minimized
    /// window does not trip wgpu validation.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}
