//! The offscreen target the shaded frame lands in.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// HDR color format of the composited scene before presentation.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// The deferred pipeline's equivalent of the default framebuffer: the
/// light-accumulation result, post-processing, and forward draws all land
/// here, and the present pass blits it to the surface.
///
/// Carries its own depth attachment; the depth-resolve step copies the
/// G-buffer depth in so forward geometry tests correctly against the
/// deferred scene.
pub struct SceneTarget {
    pub(crate) color: wgpu::Texture,
    pub(crate) color_view: wgpu::TextureView,
    pub(crate) depth: wgpu::Texture,
    pub(crate) depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
    disposed: Cell<bool>,
}

impl SceneTarget {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "scene target dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let color = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            color,
            color_view,
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

impl GpuResource for SceneTarget {
    fn label(&self) -> &str {
        "scene target"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.color.destroy();
            self.depth.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for SceneTarget {
    fn drop(&mut self) {
        self.release();
    }
}
