//! Fixed-vertex render objects with built-in primitive generators.

use glam::Mat4;
use std::sync::Arc;

use crate::camera::Camera;
use crate::color::Color;
use crate::deferred::frames::{DepthFrame, ForwardFrame, GeometryFrame};
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::object_buffer::{Primitive, VertexStreams};
use crate::render_object::{ObjectCore, Renderable};
use crate::texture::Texture;
use crate::transform::Transform;

/// A render object over a fixed set of vertices.
///
/// The vertex data is supplied once at construction (or generated by one
/// of the primitive constructors); edits through the stream accessors
/// become visible after an explicit [`rebuffer`](SolidObject::rebuffer).
pub struct SolidObject {
    core: ObjectCore,
}

impl SolidObject {
    /// Builds an object from four equal-length attribute streams.
    pub fn from_streams(
        primitive: Primitive,
        positions: Vec<[f32; 3]>,
        colors: Vec<[f32; 4]>,
        normals: Vec<[f32; 3]>,
        texcoords: Vec<[f32; 2]>,
    ) -> Result<Self, EngineError> {
        let streams = VertexStreams {
            positions: &positions,
            colors: &colors,
            normals: &normals,
            texcoords: &texcoords,
        };
        streams.validated_len()?;

        let mut core = ObjectCore::new(primitive, positions.len());
        core.positions = positions;
        core.colors = colors;
        core.normals = normals;
        core.texcoords = texcoords;
        Ok(Self { core })
    }

    /// A unit cube centered at the origin, one color, flat normals.
    pub fn cube(size: f32, color: Color) -> Self {
        let h = size * 0.5;
        // Per-face corners, CCW from outside: upper-left, lower-left,
        // upper-right, lower-right.
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            // Front (Z+)
            ([0.0, 0.0, 1.0], [[-h, h, h], [-h, -h, h], [h, h, h], [h, -h, h]]),
            // Back (Z-)
            ([0.0, 0.0, -1.0], [[h, h, -h], [h, -h, -h], [-h, h, -h], [-h, -h, -h]]),
            // Top (Y+)
            ([0.0, 1.0, 0.0], [[-h, h, -h], [-h, h, h], [h, h, -h], [h, h, h]]),
            // Bottom (Y-)
            ([0.0, -1.0, 0.0], [[-h, -h, h], [-h, -h, -h], [h, -h, h], [h, -h, -h]]),
            // Right (X+)
            ([1.0, 0.0, 0.0], [[h, h, h], [h, -h, h], [h, h, -h], [h, -h, -h]]),
            // Left (X-)
            ([-1.0, 0.0, 0.0], [[-h, h, -h], [-h, -h, -h], [-h, h, h], [-h, -h, h]]),
        ];

        let mut core = ObjectCore::new(Primitive::Triangles, 36);
        for (normal, [ul, ll, ur, lr]) in faces {
            push_quad(&mut core, [ul, ll, ur, lr], [normal; 4], [color; 4]);
        }
        Self { core }
    }

    /// A flat square plane on the XZ axis with the normal pointing up.
    pub fn plane(size: f32, color: Color) -> Self {
        let h = size * 0.5;
        let mut core = ObjectCore::new(Primitive::Triangles, 6);
        push_quad(
            &mut core,
            [[-h, 0.0, -h], [-h, 0.0, h], [h, 0.0, -h], [h, 0.0, h]],
            [[0.0, 1.0, 0.0]; 4],
            [color; 4],
        );
        Self { core }
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

    pub fn positions_mut(&mut self) -> &mut Vec<[f32; 3]> {
        &mut self.core.positions
    }

    pub fn colors_mut(&mut self) -> &mut Vec<[f32; 4]> {
        &mut self.core.colors
    }

    pub fn normals_mut(&mut self) -> &mut Vec<[f32; 3]> {
        &mut self.core.normals
    }

    pub fn texcoords_mut(&mut self) -> &mut Vec<[f32; 2]> {
        &mut self.core.texcoords
    }

    /// Whether the GPU buffer has been created yet.
    pub fn buffer_created(&self) -> bool {
        self.core.buffer_created()
    }

    /// Pushes CPU-side edits to the GPU buffer.
    pub fn rebuffer(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        self.core.rebuffer(gpu)
    }

    pub fn vertex_count(&self) -> usize {
        self.core.positions.len()
    }
}

/// Appends a quad as two CCW triangles: corners are upper-left,
/// lower-left, upper-right, lower-right.
pub(crate) fn push_quad(
    core: &mut ObjectCore,
    [ul, ll, ur, lr]: [[f32; 3]; 4],
    normals: [[f32; 3]; 4],
    colors: [Color; 4],
) {
    let uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let order = [0usize, 1, 2, 2, 1, 3];
    let corners = [ul, ll, ur, lr];
    for &i in &order {
        core.positions.push(corners[i]);
        core.colors.push(colors[i].to_array());
        core.normals.push(normals[i]);
        core.texcoords.push(uvs[i]);
    }
}

impl Renderable for SolidObject {
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
    fn cube_expands_to_36_vertices() {
        let cube = SolidObject::cube(1.0, Color::WHITE);
        assert_eq!(cube.vertex_count(), 36);
        assert!(!cube.buffer_created());
    }

    #[test]
    fn plane_expands_to_6_vertices_with_up_normals() {
        let plane = SolidObject::plane(10.0, Color::WHITE);
        assert_eq!(plane.vertex_count(), 6);
        assert!(plane.core.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn cube_vertices_sit_on_the_half_extent() {
        let cube = SolidObject::cube(2.0, Color::WHITE);
        assert!(
            cube.core
                .positions
                .iter()
                .flatten()
                .all(|c| c.abs() == 1.0)
        );
    }

    #[test]
    fn mismatched_streams_are_rejected() {
        let result = SolidObject::from_streams(
            Primitive::Triangles,
            vec![[0.0; 3]; 3],
            vec![[1.0; 4]; 3],
            vec![[0.0; 3]; 2],
            vec![[0.0; 2]; 3],
        );
        assert!(result.is_err());
    }
}
