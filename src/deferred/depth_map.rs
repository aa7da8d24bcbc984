//! The shadow-map render target.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// A depth-only target the shadow pass renders into, sized independently
/// of the screen.
pub struct DepthMapBuffer {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    disposed: Cell<bool>,
}

impl DepthMapBuffer {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "shadow map dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Depth Map"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Depth values are compared manually in the light shader, so a
        // plain non-filtering sampler is enough.
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Map Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
            disposed: Cell::new(false),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl GpuResource for DepthMapBuffer {
    fn label(&self) -> &str {
        "shadow depth map"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.texture.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for DepthMapBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
