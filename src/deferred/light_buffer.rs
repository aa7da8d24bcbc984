//! The GPU-resident light array.

use std::cell::Cell;

use crate::gpu::GpuContext;
use crate::light::{LightEnvironment, MAX_LIGHTS, PackedLight};
use crate::tracker::GpuResource;

/// A storage buffer holding the packed light array, re-uploaded in full
/// every frame the environment is rendered.
pub struct LightStorageBuffer {
    pub(crate) buffer: wgpu::Buffer,
    disposed: Cell<bool>,
}

impl LightStorageBuffer {
    pub fn new(gpu: &GpuContext) -> Self {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Storage"),
            size: (MAX_LIGHTS * std::mem::size_of::<PackedLight>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            disposed: Cell::new(false),
        }
    }

    /// Replaces the buffer contents with the environment's packed lights.
    /// Lists beyond [`MAX_LIGHTS`] truncate in insertion order.
    pub fn upload(&self, gpu: &GpuContext, env: &LightEnvironment) {
        assert!(!self.disposed.get(), "light storage used after release");
        let packed = env.pack();
        if !packed.is_empty() {
            gpu.queue
                .write_buffer(&self.buffer, 0, bytemuck::cast_slice(&packed));
        }
    }
}

impl GpuResource for LightStorageBuffer {
    fn label(&self) -> &str {
        "light storage"
    }

    fn release(&self) {
        if !self.disposed.get() {
            self.disposed.set(true);
            self.buffer.destroy();
        }
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for LightStorageBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
