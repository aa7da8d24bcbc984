//! Screen-space bloom post-processing.
//!
//! A fixed four-stage chain over the composited scene: threshold-extract
//! bright pixels, blur them with a separable Gaussian ping-ponged between
//! two offscreen targets, additively composite the result over the
//! original frame, and write it back into the scene target before
//! presentation.

use std::cell::Cell;
use std::sync::Arc;

use crate::deferred::quad::{QUAD_LAYOUTS, ScreenQuad};
use crate::deferred::scene_target::{SCENE_FORMAT, SceneTarget};
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::shader::Shader;
use crate::tracker::GpuResource;

/// Tuning options for the bloom chain.
///
/// `intensity` and `count` are validated on write; the other factors are
/// free-form weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomOptions {
    /// Weight of the blurred color in the composite. Default 0.7.
    pub blur_factor: f32,
    /// Weight of the original color in the composite. Default 1.
    pub base_factor: f32,
    /// Minimum brightness a pixel needs to enter the bloom. Default 0.4.
    pub min_brightness: f32,
    /// Exponent scale for the blur weights. Default 1400.
    pub blur_exp: f32,
    intensity: u32,
    count: u32,
}

impl Default for BloomOptions {
    fn default() -> Self {
        Self {
            blur_factor: 0.7,
            base_factor: 1.0,
            min_brightness: 0.4,
            blur_exp: 1400.0,
            intensity: 12,
            count: 1,
        }
    }
}

impl BloomOptions {
    /// Blur sample spread, also the kernel-size driver. Default 12.
    pub fn intensity(&self) -> u32 {
        self.intensity
    }

    /// Number of horizontal+vertical blur iterations. Default 1.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Sets the intensity. Values outside `[1, 127]` are rejected.
    pub fn set_intensity(&mut self, intensity: u32) -> Result<(), EngineError> {
        if !(1..=127).contains(&intensity) {
            return Err(EngineError::InvalidConfig(format!(
                "bloom intensity must be in 1..=127, got {}",
                intensity
            )));
        }
        self.intensity = intensity;
        Ok(())
    }

    /// Sets the iteration count. Values outside `[1, 16]` are rejected.
    pub fn set_count(&mut self, count: u32) -> Result<(), EngineError> {
        if !(1..=16).contains(&count) {
            return Err(EngineError::InvalidConfig(format!(
                "bloom count must be in 1..=16, got {}",
                count
            )));
        }
        self.count = count;
        Ok(())
    }

    /// Builder form of [`set_intensity`](Self::set_intensity).
    pub fn with_intensity(mut self, intensity: u32) -> Result<Self, EngineError> {
        self.set_intensity(intensity)?;
        Ok(self)
    }

    /// Builder form of [`set_count`](Self::set_count).
    pub fn with_count(mut self, count: u32) -> Result<Self, EngineError> {
        self.set_count(count)?;
        Ok(self)
    }

    fn kernel_size(&self) -> usize {
        (self.intensity / 2 + 2) as usize
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.blur_exp <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "bloom blur_exp must be positive, got {}",
                self.blur_exp
            )));
        }
        Ok(())
    }
}

/// Generates the normalized 1D Gaussian kernel the blur shader samples
/// symmetrically: `w[i] = exp(-0.5 * i^2 / d)` with `d = blur_exp^2 / 1000`,
/// normalized so `w[0] + 2 * sum(w[1..])` equals one.
pub fn generate_weights(count: usize, blur_exp: f32) -> Vec<f32> {
    let d = blur_exp * blur_exp * 0.001;
    let mut weights = Vec::with_capacity(count);
    let mut total = 0.0f32;

    for i in 0..count {
        let x = i as f32;
        let w = (-0.5 * x * x / d).exp();
        weights.push(w);
        total += if i > 0 { 2.0 * w } else { w };
    }

    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// An intermediate bloom target, scene-sized and scene-formatted.
struct BlurTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl BlurTarget {
    fn new(gpu: &GpuContext, width: u32, height: u32, label: &str) -> Self {
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
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    fn ensure_size(&mut self, gpu: &GpuContext, width: u32, height: u32, label: &str) {
        if self.width != width || self.height != height {
            self.texture.destroy();
            *self = Self::new(gpu, width, height, label);
        }
    }
}

/// Uniform block shared by the three bloom stages.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BloomUniforms {
    /// min_brightness, vertical flag, sample count, blur factor.
    settings0: [f32; 4],
    /// base factor, texel width, texel height, unused.
    settings1: [f32; 4],
}

/// The bloom post-process pass.
pub struct Bloom {
    options: BloomOptions,
    bright: BlurTarget,
    result: BlurTarget,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    combine_pipeline: wgpu::RenderPipeline,
    bright_layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,
    combine_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    shader: Arc<Shader>,
    disposed: Cell<bool>,
}

fn stage_pipeline(
    gpu: &GpuContext,
    shader: &Shader,
    layout: &wgpu::BindGroupLayout,
    entry: &str,
    label: &str,
) -> wgpu::RenderPipeline {
    let pipeline_layout = gpu
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });
    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader.module(),
                entry_point: Some("vs_main"),
                buffers: &QUAD_LAYOUTS,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader.module(),
                entry_point: Some(entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

impl Bloom {
    pub fn new(gpu: &GpuContext) -> Result<Self, EngineError> {
        let shader = Arc::new(Shader::new(
            gpu,
            "bloom",
            include_str!("shaders/bloom.wgsl"),
        )?);

        let device = &gpu.device;
        let bright_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bright Layout"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                sampler_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let combine_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Combine Layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                sampler_entry(2),
                texture_entry(4),
            ],
        });

        let bright_pipeline =
            stage_pipeline(gpu, &shader, &bright_layout, "fs_bright", "Bright Pipeline");
        let blur_pipeline = stage_pipeline(gpu, &shader, &blur_layout, "fs_blur", "Blur Pipeline");
        let combine_pipeline = stage_pipeline(
            gpu,
            &shader,
            &combine_layout,
            "fs_combine",
            "Combine Pipeline",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bloom Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            options: BloomOptions::default(),
            bright: BlurTarget::new(gpu, gpu.width(), gpu.height(), "Bloom Bright"),
            result: BlurTarget::new(gpu, gpu.width(), gpu.height(), "Bloom Result"),
            bright_pipeline,
            blur_pipeline,
            combine_pipeline,
            bright_layout,
            blur_layout,
            combine_layout,
            sampler,
            shader,
            disposed: Cell::new(false),
        })
    }

    pub fn options(&self) -> BloomOptions {
        self.options
    }

    /// Replaces the tuning options.
    pub fn set_options(&mut self, options: BloomOptions) {
        self.options = options;
    }

    /// Runs the chain against `scene`, replacing its color contents.
    pub fn run(
        &mut self,
        gpu: &GpuContext,
        scene: &SceneTarget,
        quad: &ScreenQuad,
    ) -> Result<(), EngineError> {
        assert!(!self.disposed.get(), "bloom used after release");
        self.options.validate()?;

        let (w, h) = (scene.width(), scene.height());
        self.bright.ensure_size(gpu, w, h, "Bloom Bright");
        self.result.ensure_size(gpu, w, h, "Bloom Result");

        use wgpu::util::DeviceExt;
        let weights = generate_weights(self.options.kernel_size(), self.options.blur_exp);
        let weights_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Blur Weights"),
                contents: bytemuck::cast_slice(&weights),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let uniforms = |vertical: f32| BloomUniforms {
            settings0: [
                self.options.min_brightness,
                vertical,
                self.options.intensity as f32,
                self.options.blur_factor,
            ],
            settings1: [self.options.base_factor, 1.0 / w as f32, 1.0 / h as f32, 0.0],
        };
        let horizontal_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Bloom Uniforms H"),
                contents: bytemuck::bytes_of(&uniforms(0.0)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let vertical_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Bloom Uniforms V"),
                contents: bytemuck::bytes_of(&uniforms(1.0)),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Bloom Encoder"),
            });

        // 1. Bright pass: scene -> bright.
        self.fullscreen_pass(
            &mut encoder,
            quad,
            &self.bright_pipeline,
            &self.bright_bind_group(gpu, &horizontal_buffer, &scene.color_view),
            &self.bright.view,
            "Bright Pass",
        );

        // 2. Separable blur, ping-ponged so the blurred image always ends
        //    back in the bright target.
        for _ in 0..self.options.count() {
            self.fullscreen_pass(
                &mut encoder,
                quad,
                &self.blur_pipeline,
                &self.blur_bind_group(gpu, &horizontal_buffer, &self.bright.view, &weights_buffer),
                &self.result.view,
                "Blur Horizontal",
            );
            self.fullscreen_pass(
                &mut encoder,
                quad,
                &self.blur_pipeline,
                &self.blur_bind_group(gpu, &vertical_buffer, &self.result.view, &weights_buffer),
                &self.bright.view,
                "Blur Vertical",
            );
        }

        // 3. Composite over the original frame. The result lands in a
        //    separate target first; sampling and rendering the same
        //    texture in one pass is not a thing wgpu allows.
        self.fullscreen_pass(
            &mut encoder,
            quad,
            &self.combine_pipeline,
            &self.combine_bind_group(gpu, &horizontal_buffer, &self.bright.view, &scene.color_view),
            &self.result.view,
            "Combine Pass",
        );

        // 4. The composite replaces the scene contents.
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.result.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &scene.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn fullscreen_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        quad: &ScreenQuad,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        target: &wgpu::TextureView,
        label: &str,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        quad.draw(&mut pass);
    }

    fn bright_bind_group(
        &self,
        gpu: &GpuContext,
        uniforms: &wgpu::Buffer,
        src: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bright Bind Group"),
            layout: &self.bright_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn blur_bind_group(
        &self,
        gpu: &GpuContext,
        uniforms: &wgpu::Buffer,
        src: &wgpu::TextureView,
        weights: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blur Bind Group"),
            layout: &self.blur_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: weights.as_entire_binding(),
                },
            ],
        })
    }

    fn combine_bind_group(
        &self,
        gpu: &GpuContext,
        uniforms: &wgpu::Buffer,
        blurred: &wgpu::TextureView,
        base: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Combine Bind Group"),
            layout: &self.combine_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(blurred),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(base),
                },
            ],
        })
    }
}

impl GpuResource for Bloom {
    fn label(&self) -> &str {
        "bloom"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.bright.texture.destroy();
            self.result.texture.destroy();
            self.shader.release();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for Bloom {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn symmetric_sum(weights: &[f32]) -> f32 {
        weights[0] + 2.0 * weights[1..].iter().sum::<f32>()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let options = BloomOptions::default();
        assert_relative_eq!(options.blur_factor, 0.7);
        assert_relative_eq!(options.base_factor, 1.0);
        assert_relative_eq!(options.min_brightness, 0.4);
        assert_relative_eq!(options.blur_exp, 1400.0);
        assert_eq!(options.intensity(), 12);
        assert_eq!(options.count(), 1);
    }

    #[test]
    fn intensity_rejects_out_of_range_values() {
        let options = BloomOptions::default();
        assert!(options.with_intensity(0).is_err());
        assert!(options.with_intensity(128).is_err());
        assert_eq!(options.with_intensity(127).unwrap().intensity(), 127);
        assert_eq!(options.with_intensity(1).unwrap().intensity(), 1);
    }

    #[test]
    fn count_rejects_out_of_range_values() {
        let options = BloomOptions::default();
        assert!(options.with_count(0).is_err());
        assert!(options.with_count(17).is_err());
        assert_eq!(options.with_count(16).unwrap().count(), 16);
    }

    #[test]
    fn kernel_size_follows_the_intensity() {
        let options = BloomOptions::default().with_intensity(12).unwrap();
        assert_eq!(options.kernel_size(), 8);
        let options = BloomOptions::default().with_intensity(1).unwrap();
        assert_eq!(options.kernel_size(), 2);
        let options = BloomOptions::default().with_intensity(127).unwrap();
        assert_eq!(options.kernel_size(), 65);
    }

    #[test]
    fn weights_normalize_under_symmetric_sampling() {
        for blur_exp in [1.0, 40.0, 700.0, 1400.0, 9000.0] {
            for count in [2usize, 8, 33, 65] {
                let weights = generate_weights(count, blur_exp);
                assert_eq!(weights.len(), count);
                assert_relative_eq!(symmetric_sum(&weights), 1.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn weights_decrease_monotonically() {
        let weights = generate_weights(16, 1400.0);
        for pair in weights.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn zero_blur_exp_is_rejected_before_gpu_work() {
        let mut options = BloomOptions::default();
        options.blur_exp = 0.0;
        assert!(options.validate().is_err());
    }
}
