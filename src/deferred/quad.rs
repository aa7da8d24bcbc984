//! The shared full-screen quad.

use std::cell::Cell;

use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// Vertex layouts of the quad's two streams: position (loc 0), uv (loc 1).
pub(crate) const QUAD_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 2] = [
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x2,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x2,
        }],
    },
];

/// Two triangles as a four-vertex strip spanning the NDC square, with a
/// matching UV stream. Every screen-space pass (light accumulation, the
/// bloom stages, the final blit) draws this one quad.
pub struct ScreenQuad {
    positions: wgpu::Buffer,
    texcoords: wgpu::Buffer,
    disposed: Cell<bool>,
}

impl ScreenQuad {
    pub fn new(gpu: &GpuContext) -> Self {
        use wgpu::util::DeviceExt;

        let positions: [[f32; 2]; 4] = [[-1.0, 1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, -1.0]];
        // NDC top-left maps to texture-space (0, 0).
        let texcoords: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

        let positions = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Screen Quad Positions"),
                contents: bytemuck::cast_slice(&positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let texcoords = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Screen Quad Texcoords"),
                contents: bytemuck::cast_slice(&texcoords),
                usage: wgpu::BufferUsages::VERTEX,
            });

        Self {
            positions,
            texcoords,
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        assert!(!self.disposed.get(), "screen quad used after release");
        pass.set_vertex_buffer(0, self.positions.slice(..));
        pass.set_vertex_buffer(1, self.texcoords.slice(..));
        pass.draw(0..4, 0..1);
    }
}

impl GpuResource for ScreenQuad {
    fn label(&self) -> &str {
        "screen quad"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.positions.destroy();
            self.texcoords.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for ScreenQuad {
    fn drop(&mut self) {
        self.release();
    }
}
