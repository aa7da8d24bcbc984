//! The multi-attachment geometry buffer.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// Formats of the G-buffer attachments.
pub mod formats {
    /// World-space position, `w = 1` where geometry was written.
    pub const POSITION: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    /// World-space normal.
    pub const NORMAL: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    /// Albedo in `rgb`, specular strength in `a`.
    pub const ALBEDO_SPEC: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    /// Geometry depth, copied into the scene target after shading.
    pub const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
}

/// Per-pixel geometry data the light-accumulation pass shades from:
/// position, normal, and albedo+specular color attachments plus a depth
/// attachment sized to the surface.
pub struct GBuffer {
    pub(crate) position: wgpu::Texture,
    pub(crate) position_view: wgpu::TextureView,
    pub(crate) normal: wgpu::Texture,
    pub(crate) normal_view: wgpu::TextureView,
    pub(crate) albedo_spec: wgpu::Texture,
    pub(crate) albedo_spec_view: wgpu::TextureView,
    pub(crate) depth: wgpu::Texture,
    pub(crate) depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
    disposed: Cell<bool>,
}

fn attachment(
    gpu: &GpuContext,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

impl GBuffer {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "g-buffer dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let color_usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let (position, position_view) =
            attachment(gpu, "GBuffer Position", width, height, formats::POSITION, color_usage);
        let (normal, normal_view) =
            attachment(gpu, "GBuffer Normal", width, height, formats::NORMAL, color_usage);
        let (albedo_spec, albedo_spec_view) = attachment(
            gpu,
            "GBuffer AlbedoSpec",
            width,
            height,
            formats::ALBEDO_SPEC,
            color_usage,
        );
        let (depth, depth_view) = attachment(
            gpu,
            "GBuffer Depth",
            width,
            height,
            formats::DEPTH,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );

        Ok(Self {
            position,
            position_view,
            normal,
            normal_view,
            albedo_spec,
            albedo_spec_view,
            depth,
            depth_view,
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

    pub(crate) fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl GpuResource for GBuffer {
    fn label(&self) -> &str {
        "g-buffer"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.position.destroy();
            self.normal.destroy();
            self.albedo_spec.destroy();
            self.depth.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for GBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
