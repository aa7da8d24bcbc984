//! Render objects over imported indexed geometry.

use glam::Mat4;
use std::cell::Cell;
use std::sync::Arc;

use crate::camera::Camera;
use crate::color::Color;
use crate::deferred::frames::{DepthFrame, ForwardFrame, GeometryFrame};
use crate::deferred::pipelines::{DepthUniforms, ModelUniforms};
use crate::geometry::RawGeometry;
use crate::gpu::GpuContext;
use crate::texture::Texture;
use crate::tracker::GpuResource;
use crate::transform::Transform;

/// GPU-resident indexed mesh data: one vertex buffer of interleaved
/// [`Vertex3d`](crate::geometry::Vertex3d) plus a `u32` index buffer.
pub struct MeshBuffer {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    disposed: Cell<bool>,
}

impl MeshBuffer {
    pub fn new(gpu: &GpuContext, geometry: &RawGeometry) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        assert!(!self.disposed.get(), "mesh buffer used after release");
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

impl GpuResource for MeshBuffer {
    fn label(&self) -> &str {
        "mesh buffer"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.vertex_buffer.destroy();
            self.index_buffer.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for MeshBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// A render object over imported mesh geometry.
///
/// Consumes vertex and index arrays from an external provider (or the
/// STL loader) without reinterpreting them. The GPU buffers are created
/// on the first render.
pub struct MeshObject {
    geometry: RawGeometry,
    transform: Transform,
    tint: Color,
    texture: Option<Arc<Texture>>,
    buffer: Option<MeshBuffer>,
}

impl MeshObject {
    pub fn new(geometry: RawGeometry) -> Self {
        Self {
            geometry,
            transform: Transform::default(),
            tint: Color::WHITE,
            texture: None,
            buffer: None,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Flat color multiplied into the mesh surface.
    pub fn set_tint(&mut self, tint: Color) {
        self.tint = tint;
    }

    /// Binds a texture sampled by the mesh UVs. The texture's lifetime is
    /// managed by the caller.
    pub fn set_texture(&mut self, texture: Arc<Texture>) {
        self.texture = Some(texture);
    }

    pub fn geometry(&self) -> &RawGeometry {
        &self.geometry
    }

    /// Whether the GPU buffers have been created yet.
    pub fn buffer_created(&self) -> bool {
        self.buffer.is_some()
    }

    fn ensure_buffer(&mut self, gpu: &GpuContext) {
        if self.buffer.is_none() {
            self.buffer = Some(MeshBuffer::new(gpu, &self.geometry));
        }
    }

    fn model_uniforms(&self, model_override: Mat4) -> ModelUniforms {
        let model = model_override * self.transform.model_matrix();
        ModelUniforms {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            tint: self.tint.to_array(),
        }
    }
}

impl crate::render_object::Renderable for MeshObject {
    fn defer_render(&mut self, frame: &mut GeometryFrame<'_>, model: Mat4, _view: Mat4, _proj: Mat4) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let uniforms = self.model_uniforms(model);
            frame.draw_mesh(buffer, uniforms, self.texture.as_deref());
        }
    }

    fn depth_render(
        &mut self,
        frame: &mut DepthFrame<'_>,
        light_space: Mat4,
        _near_plane: f32,
        _far_plane: f32,
    ) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let uniforms = DepthUniforms {
                light_space: light_space.to_cols_array_2d(),
                model: self.transform.model_matrix().to_cols_array_2d(),
            };
            frame.draw_mesh(buffer, uniforms);
        }
    }

    fn render_immediate(
        &mut self,
        frame: &mut ForwardFrame<'_>,
        camera: &Camera,
        transform: Transform,
    ) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let frame_uniforms = frame.frame_uniforms(camera.view_matrix(), camera.position);
            let model = transform.model_matrix() * self.transform.model_matrix();
            let uniforms = ModelUniforms {
                model: model.to_cols_array_2d(),
                normal_matrix: model.inverse().transpose().to_cols_array_2d(),
                tint: self.tint.to_array(),
            };
            frame.draw_mesh(buffer, frame_uniforms, uniforms, self.texture.as_deref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vertex3d;

    #[test]
    fn no_buffer_before_first_render() {
        let geometry = RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        let object = MeshObject::new(geometry);
        assert!(!object.buffer_created());
    }
}
