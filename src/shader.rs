//! Validated shader modules.

use std::cell::Cell;

use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::tracker::GpuResource;

/// A validated WGSL shader module.
///
/// One module carries every entry point of a pass family (`vs_*`, `fs_*`);
/// pipelines pick entry points by name. Validation failures are
/// construction errors carrying the driver's diagnostic log. A pipeline
/// cannot exist without its shader, so there is nothing to recover.
pub struct Shader {
    module: wgpu::ShaderModule,
    label: String,
    disposed: Cell<bool>,
}

impl Shader {
    /// Compiles and validates `source`, capturing the driver log on
    /// failure via a wgpu error scope.
    pub fn new(gpu: &GpuContext, label: &str, source: &str) -> Result<Self, EngineError> {
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(error) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(EngineError::ShaderCompile {
                label: label.to_owned(),
                log: error.to_string(),
            });
        }

        Ok(Self {
            module,
            label: label.to_owned(),
            disposed: Cell::new(false),
        })
    }

    /// The underlying module, for pipeline construction.
    ///
    /// # Panics
    ///
    /// Panics if the shader has been released.
    pub fn module(&self) -> &wgpu::ShaderModule {
        assert!(!self.disposed.get(), "shader '{}' used after release", self.label);
        &self.module
    }
}

impl GpuResource for Shader {
    fn label(&self) -> &str {
        &self.label
    }

    fn release(&self) {
        // Modules have no explicit destroy in wgpu; the flag still guards
        // against use after the shutdown sweep.
        self.disposed.set(true);
    }

    fn released(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.release();
    }
}
