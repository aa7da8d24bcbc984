//! The vertex-stream wrapper render objects draw from.
//!
//! An [`ObjectBuffer`] owns four separate GPU vertex buffers (positions,
//! colors, normals, texture coordinates) plus the primitive topology and
//! vertex count. It is created lazily by its owning render object on the
//! first draw and is never implicitly resized: replacing the data is an
//! explicit [`rebuffer`](ObjectBuffer::rebuffer) request by the owner.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// Primitive topology a buffer's vertices are assembled with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

impl Primitive {
    pub(crate) const ALL: [Primitive; 3] =
        [Primitive::Points, Primitive::Lines, Primitive::Triangles];

    pub(crate) fn index(self) -> usize {
        match self {
            Primitive::Points => 0,
            Primitive::Lines => 1,
            Primitive::Triangles => 2,
        }
    }

    pub(crate) fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Primitive::Points => wgpu::PrimitiveTopology::PointList,
            Primitive::Lines => wgpu::PrimitiveTopology::LineList,
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// Borrowed CPU-side attribute streams, one entry per vertex in each.
#[derive(Clone, Copy)]
pub struct VertexStreams<'a> {
    pub positions: &'a [[f32; 3]],
    pub colors: &'a [[f32; 4]],
    pub normals: &'a [[f32; 3]],
    pub texcoords: &'a [[f32; 2]],
}

impl VertexStreams<'_> {
    pub(crate) fn validated_len(&self) -> Result<usize, EngineError> {
        let n = self.positions.len();
        if self.colors.len() != n || self.normals.len() != n || self.texcoords.len() != n {
            return Err(EngineError::InvalidConfig(format!(
                "vertex streams disagree on length: {} positions, {} colors, {} normals, {} texcoords",
                n,
                self.colors.len(),
                self.normals.len(),
                self.texcoords.len()
            )));
        }
        Ok(n)
    }
}

/// Four owned vertex buffers plus topology and count.
pub struct ObjectBuffer {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    normals: wgpu::Buffer,
    texcoords: wgpu::Buffer,
    vertex_count: u32,
    /// Vertices the current GPU allocation can hold.
    capacity: usize,
    primitive: Primitive,
    disposed: Cell<bool>,
}

fn stream_buffer(gpu: &GpuContext, label: &str, bytes: &[u8]) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    gpu.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        })
}

impl ObjectBuffer {
    /// Uploads the streams into fresh GPU buffers.
    pub fn new(
        gpu: &GpuContext,
        primitive: Primitive,
        streams: VertexStreams<'_>,
    ) -> Result<Self, EngineError> {
        let len = streams.validated_len()?;
        if len == 0 {
            return Err(EngineError::InvalidConfig(
                "object buffer created with zero vertices".into(),
            ));
        }

        log::debug!("creating object buffer with {} vertices", len);

        Ok(Self {
            positions: stream_buffer(gpu, "Object Positions", bytemuck::cast_slice(streams.positions)),
            colors: stream_buffer(gpu, "Object Colors", bytemuck::cast_slice(streams.colors)),
            normals: stream_buffer(gpu, "Object Normals", bytemuck::cast_slice(streams.normals)),
            texcoords: stream_buffer(gpu, "Object Texcoords", bytemuck::cast_slice(streams.texcoords)),
            vertex_count: len as u32,
            capacity: len,
            primitive,
            disposed: Cell::new(false),
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Replaces all four streams.
    ///
    /// When the new data fits the existing allocation the buffers are
    /// overwritten in place; when it grows, the backing stores are
    /// re-specified while this wrapper keeps its identity, which is the
    /// contract the owning render object relies on. The new data is
    /// visible on the next draw.
    pub fn rebuffer(&mut self, gpu: &GpuContext, streams: VertexStreams<'_>) -> Result<(), EngineError> {
        self.ensure_live();
        let len = streams.validated_len()?;

        if len <= self.capacity {
            gpu.queue
                .write_buffer(&self.positions, 0, bytemuck::cast_slice(streams.positions));
            gpu.queue
                .write_buffer(&self.colors, 0, bytemuck::cast_slice(streams.colors));
            gpu.queue
                .write_buffer(&self.normals, 0, bytemuck::cast_slice(streams.normals));
            gpu.queue
                .write_buffer(&self.texcoords, 0, bytemuck::cast_slice(streams.texcoords));
        } else {
            log::debug!(
                "rebuffer grows object buffer from {} to {} vertices",
                self.capacity,
                len
            );
            self.positions.destroy();
            self.colors.destroy();
            self.normals.destroy();
            self.texcoords.destroy();
            self.positions =
                stream_buffer(gpu, "Object Positions", bytemuck::cast_slice(streams.positions));
            self.colors = stream_buffer(gpu, "Object Colors", bytemuck::cast_slice(streams.colors));
            self.normals =
                stream_buffer(gpu, "Object Normals", bytemuck::cast_slice(streams.normals));
            self.texcoords =
                stream_buffer(gpu, "Object Texcoords", bytemuck::cast_slice(streams.texcoords));
            self.capacity = len;
        }

        self.vertex_count = len as u32;
        Ok(())
    }

    /// Replaces all four streams through mapped staging buffers.
    ///
    /// An optimization variant of [`rebuffer`](Self::rebuffer) with the
    /// same external contract: the data is visible on the next draw. The
    /// mapped path cannot grow the allocation; oversized data is a
    /// configuration error.
    pub fn rebuffer_mapped(
        &mut self,
        gpu: &GpuContext,
        streams: VertexStreams<'_>,
    ) -> Result<(), EngineError> {
        self.ensure_live();
        let len = streams.validated_len()?;
        if len > self.capacity {
            return Err(EngineError::InvalidConfig(format!(
                "mapped rebuffer of {} vertices exceeds the allocation of {}",
                len, self.capacity
            )));
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Rebuffer Encoder"),
            });

        for (target, bytes) in [
            (&self.positions, bytemuck::cast_slice::<_, u8>(streams.positions)),
            (&self.colors, bytemuck::cast_slice::<_, u8>(streams.colors)),
            (&self.normals, bytemuck::cast_slice::<_, u8>(streams.normals)),
            (&self.texcoords, bytemuck::cast_slice::<_, u8>(streams.texcoords)),
        ] {
            let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Rebuffer Staging"),
                size: bytes.len() as u64,
                usage: wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: true,
            });
            staging
                .slice(..)
                .get_mapped_range_mut()
                .copy_from_slice(bytes);
            staging.unmap();
            encoder.copy_buffer_to_buffer(&staging, 0, target, 0, bytes.len() as u64);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        self.vertex_count = len as u32;
        Ok(())
    }

    /// Binds the streams and issues the draw.
    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'static>) {
        self.ensure_live();
        pass.set_vertex_buffer(0, self.positions.slice(..));
        pass.set_vertex_buffer(1, self.colors.slice(..));
        pass.set_vertex_buffer(2, self.normals.slice(..));
        pass.set_vertex_buffer(3, self.texcoords.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }

    fn ensure_live(&self) {
        assert!(!self.disposed.get(), "object buffer used after release");
    }
}

impl GpuResource for ObjectBuffer {
    fn label(&self) -> &str {
        "object buffer"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.positions.destroy();
            self.colors.destroy();
            self.normals.destroy();
            self.texcoords.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for ObjectBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_streams_are_rejected() {
        let streams = VertexStreams {
            positions: &[[0.0; 3]; 3],
            colors: &[[1.0; 4]; 2],
            normals: &[[0.0; 3]; 3],
            texcoords: &[[0.0; 2]; 3],
        };
        assert!(streams.validated_len().is_err());
    }

    #[test]
    fn equal_streams_report_their_length() {
        let streams = VertexStreams {
            positions: &[[0.0; 3]; 4],
            colors: &[[1.0; 4]; 4],
            normals: &[[0.0; 3]; 4],
            texcoords: &[[0.0; 2]; 4],
        };
        assert_eq!(streams.validated_len().unwrap(), 4);
    }
}
