//! GPU textures that can be bound to shaders.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// A sub-rectangle of a texture in normalized coordinates, used to derive
/// UVs for textured quads cut from an atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crop {
    /// Top-left corner, `[0, 1]`.
    pub min: [f32; 2],
    /// Bottom-right corner, `[0, 1]`.
    pub max: [f32; 2],
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            min: [0.0, 0.0],
            max: [1.0, 1.0],
        }
    }
}

/// An owned 2D texture with its view and sampler.
///
/// Texture lifetime is managed by whoever created it; render objects hold
/// shared references and never release textures themselves.
pub struct Texture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    /// Region textured quads sample from. Defaults to the full texture.
    pub crop: Crop,
    label: String,
    disposed: Cell<bool>,
}

impl Texture {
    /// Creates a texture from raw RGBA8 data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
            crop: Crop::default(),
            label: label.to_owned(),
            disposed: Cell::new(false),
        }
    }

    /// Loads a texture from an image file.
    pub fn from_file(gpu: &GpuContext, path: &str) -> Result<Self, EngineError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, path))
    }

    /// Loads a texture from in-memory encoded bytes.
    pub fn from_bytes(gpu: &GpuContext, bytes: &[u8], label: &str) -> Result<Self, EngineError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, label))
    }

    /// A 1x1 white texture, the fallback bound for untextured draws.
    pub fn white(gpu: &GpuContext) -> Self {
        Self::from_rgba(gpu, &[255, 255, 255, 255], 1, 1, "White Texture")
    }

    /// Restricts textured-quad UVs to a sub-rectangle.
    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = crop;
        self
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        assert!(
            !self.disposed.get(),
            "texture '{}' used after release",
            self.label
        );
        &self.view
    }

    pub(crate) fn sampler(&self) -> &wgpu::Sampler {
        assert!(
            !self.disposed.get(),
            "texture '{}' used after release",
            self.label
        );
        &self.sampler
    }
}

impl GpuResource for Texture {
    fn label(&self) -> &str {
        &self.label
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

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_crop_covers_the_full_texture() {
        let crop = Crop::default();
        assert_eq!(crop.min, [0.0, 0.0]);
        assert_eq!(crop.max, [1.0, 1.0]);
    }
}
