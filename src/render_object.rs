//! The render-object capability contract and the ordered render list.

use glam::Mat4;
use std::sync::Arc;

use crate::camera::Camera;
use crate::deferred::frames::{DepthFrame, ForwardFrame, GeometryFrame};
use crate::deferred::pipelines::{DepthUniforms, ModelUniforms};
use crate::gpu::GpuContext;
use crate::object_buffer::{ObjectBuffer, Primitive, VertexStreams};
use crate::texture::Texture;
use crate::transform::Transform;

/// The capability every piece of drawable geometry implements.
///
/// Three operations, one per pass family. A render object creates its GPU
/// buffer lazily on the first invocation of any of them and reuses it
/// afterwards; owners request an explicit rebuffer after CPU-side edits.
pub trait Renderable {
    /// Rasterizes the object into the G-buffer. `model` is a caller-side
    /// override composed with the object's own transform; pass identity
    /// to use the transform alone.
    fn defer_render(&mut self, frame: &mut GeometryFrame<'_>, model: Mat4, view: Mat4, proj: Mat4);

    /// Renders the object's depth from the light's point of view.
    fn depth_render(
        &mut self,
        frame: &mut DepthFrame<'_>,
        light_space: Mat4,
        near_plane: f32,
        far_plane: f32,
    );

    /// Draws the object directly into the scene, bypassing the G-buffer.
    fn render_immediate(
        &mut self,
        frame: &mut ForwardFrame<'_>,
        camera: &Camera,
        transform: Transform,
    );
}

/// The ordered collection of objects a deferred pass iterates.
///
/// Draw order within a pass equals insertion order; the pipeline neither
/// sorts nor batches, so back-to-front concerns stay with the caller.
#[derive(Default)]
pub struct RenderList {
    objects: Vec<Box<dyn Renderable>>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object, returning its stable index.
    pub fn push(&mut self, object: Box<dyn Renderable>) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Renderable + 'static)> {
        self.objects.get_mut(index).map(move |b| b.as_mut())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Removes every object.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Renderable>> {
        self.objects.iter_mut()
    }
}

/// Shared plumbing of the stream-based render objects: the CPU-side
/// attribute arrays, the lazily created GPU buffer, and the three draw
/// paths.
pub(crate) struct ObjectCore {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub primitive: Primitive,
    pub transform: Transform,
    pub texture: Option<Arc<Texture>>,
    pub buffer: Option<ObjectBuffer>,
}

impl ObjectCore {
    pub fn new(primitive: Primitive, capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            texcoords: Vec::with_capacity(capacity),
            primitive,
            transform: Transform::default(),
            texture: None,
            buffer: None,
        }
    }

    pub fn streams(&self) -> VertexStreams<'_> {
        VertexStreams {
            positions: &self.positions,
            colors: &self.colors,
            normals: &self.normals,
            texcoords: &self.texcoords,
        }
    }

    /// Creates the GPU buffer on first use. Later calls reuse it; data
    /// edits become visible only through an explicit rebuffer.
    fn ensure_buffer(&mut self, gpu: &GpuContext) {
        if self.buffer.is_none() && !self.positions.is_empty() {
            let buffer = ObjectBuffer::new(gpu, self.primitive, self.streams())
                .expect("object streams are built in lockstep");
            self.buffer = Some(buffer);
        }
    }

    /// Re-uploads the CPU streams into the existing buffer. A no-op until
    /// the buffer exists, since the first draw uploads fresh data anyway.
    pub fn rebuffer(&mut self, gpu: &GpuContext) -> Result<(), crate::EngineError> {
        let streams = VertexStreams {
            positions: &self.positions,
            colors: &self.colors,
            normals: &self.normals,
            texcoords: &self.texcoords,
        };
        match &mut self.buffer {
            Some(buffer) => buffer.rebuffer(gpu, streams),
            None => Ok(()),
        }
    }

    /// The mapped-write variant of [`rebuffer`](Self::rebuffer).
    pub fn rebuffer_mapped(&mut self, gpu: &GpuContext) -> Result<(), crate::EngineError> {
        let streams = VertexStreams {
            positions: &self.positions,
            colors: &self.colors,
            normals: &self.normals,
            texcoords: &self.texcoords,
        };
        match &mut self.buffer {
            Some(buffer) => buffer.rebuffer_mapped(gpu, streams),
            None => Ok(()),
        }
    }

    fn model_uniforms(&self, model_override: Mat4) -> ModelUniforms {
        let model = model_override * self.transform.model_matrix();
        ModelUniforms {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            tint: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn defer(&mut self, frame: &mut GeometryFrame<'_>, model: Mat4) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let uniforms = self.model_uniforms(model);
            frame.draw_object(buffer, uniforms, self.texture.as_deref());
        }
    }

    pub fn depth(&mut self, frame: &mut DepthFrame<'_>, light_space: Mat4) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let model = self.transform.model_matrix();
            let uniforms = DepthUniforms {
                light_space: light_space.to_cols_array_2d(),
                model: model.to_cols_array_2d(),
            };
            frame.draw_object(buffer, uniforms);
        }
    }

    pub fn immediate(&mut self, frame: &mut ForwardFrame<'_>, camera: &Camera, transform: Transform) {
        self.ensure_buffer(frame.gpu());
        if let Some(buffer) = &self.buffer {
            let frame_uniforms = frame.frame_uniforms(camera.view_matrix(), camera.position);
            let model = transform.model_matrix() * self.transform.model_matrix();
            let uniforms = ModelUniforms {
                model: model.to_cols_array_2d(),
                normal_matrix: model.inverse().transpose().to_cols_array_2d(),
                tint: [1.0, 1.0, 1.0, 1.0],
            };
            frame.draw_object(buffer, frame_uniforms, uniforms, self.texture.as_deref());
        }
    }

    pub fn buffer_created(&self) -> bool {
        self.buffer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        id: usize,
        order: Rc<RefCell<Vec<usize>>>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.order.borrow_mut().push(self.id);
        }
    }

    impl Renderable for Probe {
        fn defer_render(&mut self, _: &mut GeometryFrame<'_>, _: Mat4, _: Mat4, _: Mat4) {}
        fn depth_render(&mut self, _: &mut DepthFrame<'_>, _: Mat4, _: f32, _: f32) {}
        fn render_immediate(&mut self, _: &mut ForwardFrame<'_>, _: &Camera, _: Transform) {}
    }

    #[test]
    fn push_hands_out_sequential_indices() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut list = RenderList::new();
        for i in 0..4 {
            let idx = list.push(Box::new(Probe {
                id: i,
                order: order.clone(),
            }));
            assert_eq!(idx, i);
        }
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn list_preserves_insertion_order() {
        // Vec drops front to back, so drop order observes iteration order.
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut list = RenderList::new();
        for i in 0..5 {
            list.push(Box::new(Probe {
                id: i,
                order: order.clone(),
            }));
        }
        list.clear();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn core_has_no_buffer_before_first_render() {
        let core = ObjectCore::new(Primitive::Triangles, 8);
        assert!(!core.buffer_created());
    }
}
