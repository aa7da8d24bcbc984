//! The deferred lighting pipeline.
//!
//! One [`DeferredRenderer`] owns every pass resource (G-buffer, light
//! storage, shadow map, scene target, pipelines) as plain eager fields,
//! constructed once at initialization. Each frame runs the fixed stage
//! order from [`schedule::frame_schedule`]: geometry into the G-buffer,
//! an optional shadow depth pre-pass, full-screen light accumulation,
//! then a depth copy into the scene target so forward draws keep testing
//! correctly. Bloom and presentation are separate entry points executed
//! against the composited scene.

pub mod depth_map;
pub mod frames;
pub mod gbuffer;
pub mod light_buffer;
pub(crate) mod pipelines;
pub mod quad;
pub mod scene_target;
pub mod schedule;

use std::sync::Arc;

use glam::Mat4;

use crate::camera::Camera;
use crate::color::Color;
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::light::LightEnvironment;
use crate::render_object::RenderList;
use crate::shader::Shader;
use crate::shadow::ShadowView;
use crate::texture::Texture;
use crate::tracker::{GpuResource, ResourceTracker};

use depth_map::DepthMapBuffer;
use frames::{DepthFrame, ForwardFrame, GeometryFrame};
use gbuffer::GBuffer;
use light_buffer::LightStorageBuffer;
use pipelines::{
    DepthPipelines, ForwardPipelines, FrameUniforms, GeometryPipelines, LightPassUniforms,
    LightPipelines, SharedLayouts, blit_pipeline, light_frame_bind_group, uniform_bind_group,
};
use quad::ScreenQuad;
use scene_target::SceneTarget;
use schedule::{PassStage, frame_schedule};

/// Default shadow-map resolution.
pub const DEFAULT_SHADOW_MAP_SIZE: u32 = 2048;

/// The deferred shading pipeline and its pass resources.
pub struct DeferredRenderer {
    layouts: SharedLayouts,
    geometry_pipelines: GeometryPipelines,
    depth_pipelines: DepthPipelines,
    forward_pipelines: ForwardPipelines,
    light_pipelines: LightPipelines,
    present_pipeline: wgpu::RenderPipeline,

    gbuffer: Arc<GBuffer>,
    scene: Arc<SceneTarget>,
    depth_map: Arc<DepthMapBuffer>,
    lights: Arc<LightStorageBuffer>,
    quad: Arc<ScreenQuad>,
    shaders: Vec<Arc<Shader>>,
    white: Arc<Texture>,

    gbuffer_sampler: wgpu::Sampler,
    blit_sampler: wgpu::Sampler,

    fov_y_degrees: f32,
    depth_near: f32,
    depth_far: f32,
}

impl DeferredRenderer {
    /// Builds the pipeline with the default shadow-map resolution.
    pub fn new(gpu: &GpuContext) -> Result<Self, EngineError> {
        Self::with_shadow_map_size(gpu, DEFAULT_SHADOW_MAP_SIZE)
    }

    /// Builds the pipeline with an explicit shadow-map resolution.
    pub fn with_shadow_map_size(gpu: &GpuContext, shadow_size: u32) -> Result<Self, EngineError> {
        let layouts = SharedLayouts::new(gpu);

        let gbuffer_shader = Arc::new(Shader::new(
            gpu,
            "gbuffer",
            include_str!("../shaders/gbuffer.wgsl"),
        )?);
        let depth_shader = Arc::new(Shader::new(
            gpu,
            "shadow_depth",
            include_str!("../shaders/shadow_depth.wgsl"),
        )?);
        let light_shader = Arc::new(Shader::new(
            gpu,
            "light",
            include_str!("../shaders/light.wgsl"),
        )?);
        let forward_shader = Arc::new(Shader::new(
            gpu,
            "forward",
            include_str!("../shaders/forward.wgsl"),
        )?);
        let blit_shader = Arc::new(Shader::new(
            gpu,
            "blit",
            include_str!("../shaders/blit.wgsl"),
        )?);

        let geometry_pipelines = GeometryPipelines::new(gpu, &gbuffer_shader, &layouts);
        let depth_pipelines = DepthPipelines::new(gpu, &depth_shader, &layouts);
        let forward_pipelines = ForwardPipelines::new(gpu, &forward_shader, &layouts);
        let light_pipelines = LightPipelines::new(gpu, &light_shader, &layouts);
        let present_pipeline = blit_pipeline(
            gpu,
            &blit_shader,
            &layouts,
            gpu.config.format,
            "Present Pipeline",
        );

        let gbuffer = Arc::new(GBuffer::new(gpu, gpu.width(), gpu.height())?);
        let scene = Arc::new(SceneTarget::new(gpu, gpu.width(), gpu.height())?);
        let depth_map = Arc::new(DepthMapBuffer::new(gpu, shadow_size, shadow_size)?);
        let lights = Arc::new(LightStorageBuffer::new(gpu));
        let quad = Arc::new(ScreenQuad::new(gpu));
        let white = Arc::new(Texture::white(gpu));

        // G-buffer attachments hold world-space data; nearest sampling
        // avoids bleeding positions across geometry edges.
        let gbuffer_sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("GBuffer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let blit_sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "deferred renderer ready: {}x{} scene, {}x{} shadow map",
            gpu.width(),
            gpu.height(),
            shadow_size,
            shadow_size
        );

        Ok(Self {
            layouts,
            geometry_pipelines,
            depth_pipelines,
            forward_pipelines,
            light_pipelines,
            present_pipeline,
            gbuffer,
            scene,
            depth_map,
            lights,
            quad,
            shaders: vec![
                gbuffer_shader,
                depth_shader,
                light_shader,
                forward_shader,
                blit_shader,
            ],
            white,
            gbuffer_sampler,
            blit_sampler,
            fov_y_degrees: 90.0,
            depth_near: 0.5,
            depth_far: 1200.0,
        })
    }

    /// Registers the pipeline's long-lived GPU resources for the
    /// shutdown sweep. Called by the embedder; nothing registers itself.
    pub fn register_resources(&self, tracker: &mut ResourceTracker) {
        tracker.track(self.gbuffer.clone());
        tracker.track(self.scene.clone());
        tracker.track(self.depth_map.clone());
        tracker.track(self.lights.clone());
        tracker.track(self.quad.clone());
        tracker.track(self.white.clone());
        for shader in &self.shaders {
            tracker.track(shader.clone());
        }
    }

    /// Sets the vertical field of view in degrees.
    pub fn set_field_of_view(&mut self, degrees: f32) -> Result<(), EngineError> {
        if !(degrees > 0.0 && degrees < 180.0) {
            return Err(EngineError::InvalidConfig(format!(
                "field of view must be in (0, 180), got {}",
                degrees
            )));
        }
        self.fov_y_degrees = degrees;
        Ok(())
    }

    /// Sets the projection depth range.
    pub fn set_depth_range(&mut self, near: f32, far: f32) -> Result<(), EngineError> {
        if !(near > 0.0 && far > near) {
            return Err(EngineError::InvalidConfig(format!(
                "depth range must satisfy 0 < near < far, got {}..{}",
                near, far
            )));
        }
        self.depth_near = near;
        self.depth_far = far;
        Ok(())
    }

    fn projection(&self, gpu: &GpuContext) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            gpu.aspect(),
            self.depth_near,
            self.depth_far,
        )
    }

    /// Recreates the screen-sized targets when the surface has changed.
    fn ensure_targets(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        let (w, h) = (gpu.width(), gpu.height());
        if !self.gbuffer.matches(w, h) {
            log::info!("resizing deferred targets to {}x{}", w, h);
            self.gbuffer.release();
            self.gbuffer = Arc::new(GBuffer::new(gpu, w, h)?);
        }
        if !self.scene.matches(w, h) {
            self.scene.release();
            self.scene = Arc::new(SceneTarget::new(gpu, w, h)?);
        }
        Ok(())
    }

    // ── Pipeline entry points ─────────────────────────────────────────────

    /// Renders the list with deferred lighting. Runs at the beginning of
    /// a frame; forward objects draw afterwards through
    /// [`forward_frame`](Self::forward_frame).
    pub fn render_with_lights(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        list: &mut RenderList,
        env: &LightEnvironment,
        background: Color,
    ) -> Result<(), EngineError> {
        self.render_frame(gpu, camera, list, env, background, None)
    }

    /// Renders the list with deferred lighting and shadow mapping.
    pub fn render_with_lights_and_shadows(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        list: &mut RenderList,
        env: &LightEnvironment,
        background: Color,
        shadow: &ShadowView,
    ) -> Result<(), EngineError> {
        self.render_frame(gpu, camera, list, env, background, Some(shadow))
    }

    fn render_frame(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        list: &mut RenderList,
        env: &LightEnvironment,
        background: Color,
        shadow: Option<&ShadowView>,
    ) -> Result<(), EngineError> {
        self.ensure_targets(gpu)?;

        let view = camera.view_matrix();
        let proj = self.projection(gpu);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Deferred Frame Encoder"),
            });

        for stage in frame_schedule(shadow.is_some(), false) {
            match stage {
                PassStage::Geometry => {
                    self.geometry_pass(gpu, &mut encoder, list, camera, view, proj);
                }
                PassStage::ShadowDepth => {
                    if let Some(shadow) = shadow {
                        self.shadow_pass(gpu, &mut encoder, list, shadow);
                    }
                }
                PassStage::LightAccumulation => {
                    self.light_pass(gpu, &mut encoder, camera, env, background, shadow);
                }
                PassStage::DepthResolve => self.depth_resolve(&mut encoder),
                // Bloom and presentation run through their own entry
                // points, against the composited scene.
                PassStage::Bloom | PassStage::Present => {}
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn geometry_pass(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        list: &mut RenderList,
        camera: &Camera,
        view: Mat4,
        proj: Mat4,
    ) {
        let uniforms = FrameUniforms {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_pos: [camera.position.x, camera.position.y, camera.position.z, 0.0],
        };
        let frame_group = uniform_bind_group(
            gpu,
            &self.layouts.frame,
            bytemuck::bytes_of(&uniforms),
            "Frame Uniforms",
        );

        let clear = wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        };
        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Geometry Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.gbuffer.position_view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: clear,
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.gbuffer.normal_view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: clear,
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.gbuffer.albedo_spec_view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: clear,
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.gbuffer.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        let mut frame = GeometryFrame {
            gpu,
            pass,
            pipelines: &self.geometry_pipelines,
            layouts: &self.layouts,
            frame_group,
            white: &self.white,
        };

        // Draw order is the list's insertion order; no sorting.
        for object in list.iter_mut() {
            object.defer_render(&mut frame, Mat4::IDENTITY, view, proj);
        }
    }

    fn shadow_pass(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        list: &mut RenderList,
        shadow: &ShadowView,
    ) {
        let light_space = shadow.light_space_matrix();

        // The pass targets the shadow map alone, which also scopes the
        // viewport to its resolution.
        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        let mut frame = DepthFrame {
            gpu,
            pass,
            pipelines: &self.depth_pipelines,
            layouts: &self.layouts,
        };

        for object in list.iter_mut() {
            object.depth_render(&mut frame, light_space, shadow.near_plane, shadow.far_plane);
        }
    }

    fn light_pass(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
        env: &LightEnvironment,
        background: Color,
        shadow: Option<&ShadowView>,
    ) {
        // Full replace of the packed light array, every frame.
        self.lights.upload(gpu, env);

        let light_space = shadow
            .map(|s| s.light_space_matrix())
            .unwrap_or(Mat4::IDENTITY);
        let (light_pos, light_dir, intensity) = match shadow {
            Some(s) => (
                s.light_perspective.position,
                s.light_direction(),
                s.intensity,
            ),
            None => (glam::Vec3::ZERO, glam::Vec3::NEG_Y, 0.0),
        };

        let uniforms = LightPassUniforms {
            light_space: light_space.to_cols_array_2d(),
            ambient: [
                env.ambient_color.r,
                env.ambient_color.g,
                env.ambient_color.b,
                env.ambient_intensity,
            ],
            back_color: background.to_array(),
            view_pos: [camera.position.x, camera.position.y, camera.position.z, 0.0],
            light_pos: [light_pos.x, light_pos.y, light_pos.z, intensity],
            light_dir: [light_dir.x, light_dir.y, light_dir.z, 0.0],
            counts: [env.active_count(), shadow.is_some() as u32, 0, 0],
        };

        let frame_group = light_frame_bind_group(
            gpu,
            &self.layouts.light_frame,
            &uniforms,
            &self.gbuffer,
            &self.gbuffer_sampler,
        );
        let storage_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Light Storage Bind Group"),
            layout: &self.layouts.light_storage,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: self.lights.buffer.as_entire_binding(),
            }],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Light Accumulation Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.scene.color_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(background.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        match shadow {
            Some(_) => {
                let shadow_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Shadow Map Bind Group"),
                    layout: &self.layouts.shadow_map,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&self.depth_map.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.depth_map.sampler),
                        },
                    ],
                });
                pass.set_pipeline(&self.light_pipelines.shadowed);
                pass.set_bind_group(0, &frame_group, &[]);
                pass.set_bind_group(1, &storage_group, &[]);
                pass.set_bind_group(2, &shadow_group, &[]);
                self.quad.draw(&mut pass);
            }
            None => {
                pass.set_pipeline(&self.light_pipelines.plain);
                pass.set_bind_group(0, &frame_group, &[]);
                pass.set_bind_group(1, &storage_group, &[]);
                self.quad.draw(&mut pass);
            }
        }
    }

    /// Copies G-buffer depth into the scene target so forward geometry
    /// depth-tests against the deferred scene.
    fn depth_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.gbuffer.depth,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &self.scene.depth,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.gbuffer.width(),
                height: self.gbuffer.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    /// Begins an immediate-mode forward pass over the composited scene.
    /// Draw through the returned frame, then call
    /// [`finish`](ForwardFrame::finish).
    pub fn forward_frame<'a>(&'a self, gpu: &'a GpuContext) -> ForwardFrame<'a> {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Forward Frame Encoder"),
            });

        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.scene.color_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.scene.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        ForwardFrame {
            gpu,
            pass: Some(pass),
            encoder: Some(encoder),
            pipelines: &self.forward_pipelines,
            layouts: &self.layouts,
            proj: self.projection(gpu),
            white: &self.white,
        }
    }

    /// Runs the bloom chain over the composited scene.
    pub fn run_bloom(
        &mut self,
        gpu: &GpuContext,
        bloom: &mut crate::bloom::Bloom,
    ) -> Result<(), EngineError> {
        bloom.run(gpu, &self.scene, &self.quad)
    }

    /// Blits the composited scene to the surface and presents the frame.
    pub fn present(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        let output = gpu
            .surface
            .get_current_texture()
            .map_err(|e| EngineError::Surface(e.to_string()))?;
        let screen_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let blit_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Present Bind Group"),
            layout: &self.layouts.blit,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.scene.color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.blit_sampler),
                },
            ],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &screen_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.present_pipeline);
            pass.set_bind_group(0, &blit_group, &[]);
            self.quad.draw(&mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
