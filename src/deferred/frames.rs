//! Per-pass frame contexts handed to render objects.
//!
//! A frame context wraps the recording render pass together with the
//! pipelines of that pass, so a [`Renderable`](crate::Renderable) only
//! decides *what* to draw; topology-to-pipeline selection and transient
//! bind groups live here. Passes are recorded with `forget_lifetime`, so
//! transient buffers created mid-pass stay alive until the pass ends.

use crate::deferred::pipelines::{
    DepthPipelines, DepthUniforms, ForwardPipelines, FrameUniforms, GeometryPipelines,
    ModelUniforms, SharedLayouts, uniform_bind_group,
};
use crate::gpu::GpuContext;
use crate::mesh_object::MeshBuffer;
use crate::object_buffer::ObjectBuffer;
use crate::texture::Texture;

fn surface_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
) -> wgpu::BindGroup {
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Surface Texture Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(texture.view()),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(texture.sampler()),
            },
        ],
    })
}

/// The G-buffer geometry pass.
pub struct GeometryFrame<'a> {
    pub(crate) gpu: &'a GpuContext,
    pub(crate) pass: wgpu::RenderPass<'static>,
    pub(crate) pipelines: &'a GeometryPipelines,
    pub(crate) layouts: &'a SharedLayouts,
    pub(crate) frame_group: wgpu::BindGroup,
    pub(crate) white: &'a Texture,
}

impl GeometryFrame<'_> {
    pub fn gpu(&self) -> &GpuContext {
        self.gpu
    }

    /// Draws four-stream object geometry into the G-buffer.
    pub fn draw_object(
        &mut self,
        buffer: &ObjectBuffer,
        uniforms: ModelUniforms,
        texture: Option<&Texture>,
    ) {
        let model_group = uniform_bind_group(
            self.gpu,
            &self.layouts.model,
            bytemuck::bytes_of(&uniforms),
            "Model Uniforms",
        );
        let texture_group = surface_bind_group(
            self.gpu,
            &self.layouts.texture,
            texture.unwrap_or(self.white),
        );

        self.pass
            .set_pipeline(self.pipelines.object(buffer.primitive()));
        self.pass.set_bind_group(0, &self.frame_group, &[]);
        self.pass.set_bind_group(1, &model_group, &[]);
        self.pass.set_bind_group(2, &texture_group, &[]);
        buffer.draw(&mut self.pass);
    }

    /// Draws interleaved indexed mesh geometry into the G-buffer.
    pub fn draw_mesh(
        &mut self,
        mesh: &MeshBuffer,
        uniforms: ModelUniforms,
        texture: Option<&Texture>,
    ) {
        let model_group = uniform_bind_group(
            self.gpu,
            &self.layouts.model,
            bytemuck::bytes_of(&uniforms),
            "Model Uniforms",
        );
        let texture_group = surface_bind_group(
            self.gpu,
            &self.layouts.texture,
            texture.unwrap_or(self.white),
        );

        self.pass.set_pipeline(&self.pipelines.mesh);
        self.pass.set_bind_group(0, &self.frame_group, &[]);
        self.pass.set_bind_group(1, &model_group, &[]);
        self.pass.set_bind_group(2, &texture_group, &[]);
        mesh.draw(&mut self.pass);
    }
}

/// The shadow depth pass. No color output.
pub struct DepthFrame<'a> {
    pub(crate) gpu: &'a GpuContext,
    pub(crate) pass: wgpu::RenderPass<'static>,
    pub(crate) pipelines: &'a DepthPipelines,
    pub(crate) layouts: &'a SharedLayouts,
}

impl DepthFrame<'_> {
    pub fn gpu(&self) -> &GpuContext {
        self.gpu
    }

    /// Renders object depth from the light's point of view.
    pub fn draw_object(&mut self, buffer: &ObjectBuffer, uniforms: DepthUniforms) {
        let group = uniform_bind_group(
            self.gpu,
            &self.layouts.depth_frame,
            bytemuck::bytes_of(&uniforms),
            "Depth Uniforms",
        );
        self.pass
            .set_pipeline(self.pipelines.object(buffer.primitive()));
        self.pass.set_bind_group(0, &group, &[]);
        buffer.draw(&mut self.pass);
    }

    /// Renders mesh depth from the light's point of view.
    pub fn draw_mesh(&mut self, mesh: &MeshBuffer, uniforms: DepthUniforms) {
        let group = uniform_bind_group(
            self.gpu,
            &self.layouts.depth_frame,
            bytemuck::bytes_of(&uniforms),
            "Depth Uniforms",
        );
        self.pass.set_pipeline(&self.pipelines.mesh);
        self.pass.set_bind_group(0, &group, &[]);
        mesh.draw(&mut self.pass);
    }
}

/// The immediate-mode forward pass, drawing into the composited scene
/// with depth testing against the resolved deferred depth.
///
/// Obtained from
/// [`DeferredRenderer::forward_frame`](crate::DeferredRenderer::forward_frame);
/// call [`finish`](ForwardFrame::finish) to submit the recorded draws.
pub struct ForwardFrame<'a> {
    pub(crate) gpu: &'a GpuContext,
    pub(crate) pass: Option<wgpu::RenderPass<'static>>,
    pub(crate) encoder: Option<wgpu::CommandEncoder>,
    pub(crate) pipelines: &'a ForwardPipelines,
    pub(crate) layouts: &'a SharedLayouts,
    pub(crate) proj: glam::Mat4,
    pub(crate) white: &'a Texture,
}

impl ForwardFrame<'_> {
    pub fn gpu(&self) -> &GpuContext {
        self.gpu
    }

    pub(crate) fn frame_uniforms(&self, view: glam::Mat4, view_pos: glam::Vec3) -> FrameUniforms {
        FrameUniforms {
            view: view.to_cols_array_2d(),
            proj: self.proj.to_cols_array_2d(),
            view_pos: [view_pos.x, view_pos.y, view_pos.z, 0.0],
        }
    }

    /// Draws four-stream object geometry with the given camera state.
    pub fn draw_object(
        &mut self,
        buffer: &ObjectBuffer,
        frame: FrameUniforms,
        uniforms: ModelUniforms,
        texture: Option<&Texture>,
    ) {
        let frame_group = uniform_bind_group(
            self.gpu,
            &self.layouts.frame,
            bytemuck::bytes_of(&frame),
            "Forward Frame Uniforms",
        );
        let model_group = uniform_bind_group(
            self.gpu,
            &self.layouts.model,
            bytemuck::bytes_of(&uniforms),
            "Model Uniforms",
        );
        let texture_group = surface_bind_group(
            self.gpu,
            &self.layouts.texture,
            texture.unwrap_or(self.white),
        );

        let pass = self.pass.as_mut().expect("forward frame already finished");
        pass.set_pipeline(self.pipelines.object(buffer.primitive()));
        pass.set_bind_group(0, &frame_group, &[]);
        pass.set_bind_group(1, &model_group, &[]);
        pass.set_bind_group(2, &texture_group, &[]);
        buffer.draw(pass);
    }

    /// Draws interleaved indexed mesh geometry with the given camera
    /// state.
    pub fn draw_mesh(
        &mut self,
        mesh: &MeshBuffer,
        frame: FrameUniforms,
        uniforms: ModelUniforms,
        texture: Option<&Texture>,
    ) {
        let frame_group = uniform_bind_group(
            self.gpu,
            &self.layouts.frame,
            bytemuck::bytes_of(&frame),
            "Forward Frame Uniforms",
        );
        let model_group = uniform_bind_group(
            self.gpu,
            &self.layouts.model,
            bytemuck::bytes_of(&uniforms),
            "Model Uniforms",
        );
        let texture_group = surface_bind_group(
            self.gpu,
            &self.layouts.texture,
            texture.unwrap_or(self.white),
        );

        let pass = self.pass.as_mut().expect("forward frame already finished");
        pass.set_pipeline(&self.pipelines.mesh);
        pass.set_bind_group(0, &frame_group, &[]);
        pass.set_bind_group(1, &model_group, &[]);
        pass.set_bind_group(2, &texture_group, &[]);
        mesh.draw(pass);
    }

    /// Ends the pass and submits the recorded forward draws.
    pub fn finish(mut self) {
        drop(self.pass.take());
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}
