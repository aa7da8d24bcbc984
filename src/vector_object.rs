//! Growable render objects built by appending primitives.

use glam::{Mat4, Vec3};
use std::sync::Arc;

use crate::camera::Camera;
use crate::color::Color;
use crate::deferred::frames::{DepthFrame, ForwardFrame, GeometryFrame};
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::object_buffer::Primitive;
use crate::render_object::{ObjectCore, Renderable};
use crate::texture::Texture;
use crate::transform::Transform;

/// A render object with variable-length vertex data.
///
/// Primitives are appended on the CPU side; the GPU buffer is created on
/// the first render and reused afterwards. Appends or [`clear`] after the
/// first render become visible only through [`rebuffer`] or
/// [`rebuffer_mapped`]; the buffer is never resized implicitly.
///
/// [`clear`]: VectorObject::clear
/// [`rebuffer`]: VectorObject::rebuffer
/// [`rebuffer_mapped`]: VectorObject::rebuffer_mapped
pub struct VectorObject {
    core: ObjectCore,
}

impl VectorObject {
    /// Creates an empty object assembling its vertices as `primitive`,
    /// with CPU-side capacity for `size` vertices.
    pub fn new(primitive: Primitive, size: usize) -> Self {
        Self {
            core: ObjectCore::new(primitive, size),
        }
    }

    /// Whether the GPU buffer has been created yet.
    pub fn buffer_created(&self) -> bool {
        self.core.buffer_created()
    }

    pub fn vertex_count(&self) -> usize {
        self.core.positions.len()
    }

    pub fn transform(&self) -> Transform {
        self.core.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.core.transform = transform;
    }

    /// Binds a texture sampled by the object's UVs. The texture's
    /// lifetime is managed by the caller.
    pub fn set_texture(&mut self, texture: Arc<Texture>) {
        self.core.texture = Some(texture);
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, color: Color, uv: [f32; 2]) {
        self.core.positions.push(position.to_array());
        self.core.colors.push(color.to_array());
        self.core.normals.push(normal.to_array());
        self.core.texcoords.push(uv);
    }

    /// Appends a single-color triangle.
    pub fn add_triangle(&mut self, v1: Vec3, v2: Vec3, v3: Vec3, normal: Vec3, color: Color) {
        self.add_triangle_colors(v1, v2, v3, normal, color, color, color);
    }

    /// Appends a triangle with per-vertex colors.
    pub fn add_triangle_colors(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        v3: Vec3,
        normal: Vec3,
        c1: Color,
        c2: Color,
        c3: Color,
    ) {
        self.push_vertex(v1, normal, c1, [0.0, 0.0]);
        self.push_vertex(v2, normal, c2, [0.0, 0.0]);
        self.push_vertex(v3, normal, c3, [0.0, 0.0]);
    }

    /// Appends a single-color quad as two triangles. Corners are
    /// upper-left, lower-left, upper-right, lower-right.
    pub fn add_quad(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        v3: Vec3,
        v4: Vec3,
        normals: [Vec3; 4],
        color: Color,
    ) {
        self.add_quad_colors(v1, v2, v3, v4, normals, [color; 4]);
    }

    /// Appends a quad with per-vertex normals and colors.
    pub fn add_quad_colors(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        v3: Vec3,
        v4: Vec3,
        normals: [Vec3; 4],
        colors: [Color; 4],
    ) {
        self.push_vertex(v1, normals[0], colors[0], [0.0, 0.0]);
        self.push_vertex(v2, normals[1], colors[1], [0.0, 0.0]);
        self.push_vertex(v3, normals[2], colors[2], [0.0, 0.0]);

        self.push_vertex(v3, normals[2], colors[2], [0.0, 0.0]);
        self.push_vertex(v2, normals[1], colors[1], [0.0, 0.0]);
        self.push_vertex(v4, normals[3], colors[3], [0.0, 0.0]);
    }

    /// Appends a single-color line segment.
    pub fn add_line(&mut self, v1: Vec3, v2: Vec3, normal1: Vec3, normal2: Vec3, color: Color) {
        self.add_line_colors(v1, v2, normal1, normal2, color, color);
    }

    /// Appends a line segment with per-end colors.
    pub fn add_line_colors(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        normal1: Vec3,
        normal2: Vec3,
        c1: Color,
        c2: Color,
    ) {
        self.push_vertex(v1, normal1, c1, [0.0, 0.0]);
        self.push_vertex(v2, normal2, c2, [0.0, 0.0]);
    }

    /// Appends a point.
    pub fn add_point(&mut self, v: Vec3, normal: Vec3, color: Color) {
        self.push_vertex(v, normal, color, [0.0, 0.0]);
    }

    /// Appends a textured quad as two triangles, deriving UVs from the
    /// texture's crop bounds. Corners are upper-left, lower-left,
    /// upper-right, lower-right.
    pub fn add_texture_quad(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        v3: Vec3,
        v4: Vec3,
        normal: Vec3,
        color: Color,
        texture: &Texture,
    ) {
        self.add_texture_quad_normals(v1, v2, v3, v4, [normal; 4], color, texture);
    }

    /// The per-vertex-normal variant of
    /// [`add_texture_quad`](Self::add_texture_quad).
    pub fn add_texture_quad_normals(
        &mut self,
        v1: Vec3,
        v2: Vec3,
        v3: Vec3,
        v4: Vec3,
        normals: [Vec3; 4],
        color: Color,
        texture: &Texture,
    ) {
        let crop = texture.crop;
        let ul = [crop.min[0], crop.min[1]];
        let ll = [crop.min[0], crop.max[1]];
        let ur = [crop.max[0], crop.min[1]];
        let lr = [crop.max[0], crop.max[1]];

        self.push_vertex(v1, normals[0], color, ul);
        self.push_vertex(v2, normals[1], color, ll);
        self.push_vertex(v3, normals[2], color, ur);

        self.push_vertex(v3, normals[2], color, ur);
        self.push_vertex(v2, normals[1], color, ll);
        self.push_vertex(v4, normals[3], color, lr);
    }

    /// Empties the CPU-side vertex data. The GPU buffer is kept; a
    /// following [`rebuffer`](Self::rebuffer) restores the object to
    /// empty without destroying it.
    pub fn clear(&mut self) {
        self.core.positions.clear();
        self.core.colors.clear();
        self.core.normals.clear();
        self.core.texcoords.clear();
    }

    /// Pushes CPU-side edits to the GPU buffer.
    pub fn rebuffer(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        self.core.rebuffer(gpu)
    }

    /// The mapped-write variant of [`rebuffer`](Self::rebuffer); same
    /// external contract.
    pub fn rebuffer_mapped(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        self.core.rebuffer_mapped(gpu)
    }
}

impl Renderable for VectorObject {
    fn defer_render(&mut self, frame: &mut GeometryFrame<'_>, model: Mat4, _view: Mat4, _proj: Mat4) {
        self.core.defer(frame, model);
    }

    fn depth_render(
        &mut self,
        frame: &mut DepthFrame<'_>,
        light_space: Mat4,
        _near_plane: f32,
        _far_plane: f32,
    ) {
        self.core.depth(frame, light_space);
    }

    fn render_immediate(
        &mut self,
        frame: &mut ForwardFrame<'_>,
        camera: &Camera,
        transform: Transform,
    ) {
        self.core.immediate(frame, camera, transform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_grow_all_streams_in_lockstep() {
        let mut object = VectorObject::new(Primitive::Triangles, 16);
        object.add_triangle(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Color::WHITE);
        object.add_quad(
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::ONE,
            [Vec3::Z; 4],
            Color::BLACK,
        );
        assert_eq!(object.vertex_count(), 9);
        assert_eq!(object.core.colors.len(), 9);
        assert_eq!(object.core.normals.len(), 9);
        assert_eq!(object.core.texcoords.len(), 9);
    }

    #[test]
    fn per_vertex_colors_land_in_order() {
        let mut object = VectorObject::new(Primitive::Triangles, 4);
        object.add_triangle_colors(
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
            Color::rgb(1.0, 0.0, 0.0),
            Color::rgb(0.0, 1.0, 0.0),
            Color::rgb(0.0, 0.0, 1.0),
        );
        assert_eq!(object.core.colors[0][0], 1.0);
        assert_eq!(object.core.colors[1][1], 1.0);
        assert_eq!(object.core.colors[2][2], 1.0);
    }

    #[test]
    fn lines_and_points_append_their_vertex_counts() {
        let mut object = VectorObject::new(Primitive::Lines, 4);
        object.add_line(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Y, Color::WHITE);
        assert_eq!(object.vertex_count(), 2);

        let mut points = VectorObject::new(Primitive::Points, 4);
        points.add_point(Vec3::ZERO, Vec3::Y, Color::WHITE);
        assert_eq!(points.vertex_count(), 1);
    }

    #[test]
    fn clear_restores_empty_without_touching_the_buffer_flag() {
        let mut object = VectorObject::new(Primitive::Triangles, 4);
        object.add_triangle(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Color::WHITE);
        object.clear();
        assert_eq!(object.vertex_count(), 0);
        assert!(!object.buffer_created());
    }
}
