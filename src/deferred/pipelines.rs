//! Bind-group layouts, uniform blocks, and pipeline construction for the
//! deferred renderer.
//!
//! Object-stream passes come in one pipeline per primitive topology
//! (wgpu bakes topology into the pipeline), plus an interleaved-vertex
//! variant for imported meshes.

use crate::deferred::quad::QUAD_LAYOUTS;
use crate::deferred::scene_target::SCENE_FORMAT;
use crate::deferred::{gbuffer, gbuffer::GBuffer};
use crate::geometry::Vertex3d;
use crate::gpu::GpuContext;
use crate::object_buffer::Primitive;
use crate::shader::Shader;

// ── Uniform blocks ────────────────────────────────────────────────────────

/// Per-pass camera data, bound at group 0 of the geometry and forward
/// passes.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// Camera position, `w` unused.
    pub view_pos: [f32; 4],
}

/// Per-draw object data, bound at group 1.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix, for normals under
    /// non-uniform scale.
    pub normal_matrix: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

/// Uniforms of the shadow depth pass.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct DepthUniforms {
    pub light_space: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

/// Uniforms of the light-accumulation pass.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LightPassUniforms {
    pub light_space: [[f32; 4]; 4],
    /// Ambient color in `rgb`, ambient intensity in `w`.
    pub ambient: [f32; 4],
    /// Background color for pixels no geometry covered.
    pub back_color: [f32; 4],
    /// Camera position, `w` unused.
    pub view_pos: [f32; 4],
    /// Shadow light position in `xyz`, shadow intensity in `w`.
    pub light_pos: [f32; 4],
    /// Shadow light direction, `w` unused.
    pub light_dir: [f32; 4],
    /// `x` = active light count, `y` = 1 when shadowing.
    pub counts: [u32; 4],
}

// ── Vertex layouts ────────────────────────────────────────────────────────

/// The four separate streams of an [`crate::object_buffer::ObjectBuffer`]:
/// position (loc 0), color (loc 1), normal (loc 2), uv (loc 3).
pub(crate) const OBJECT_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 4] = [
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 16,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x4,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x3,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 3,
            format: wgpu::VertexFormat::Float32x2,
        }],
    },
];

/// Position stream only, for depth-only passes.
const POSITION_LAYOUT: [wgpu::VertexBufferLayout<'static>; 1] = [wgpu::VertexBufferLayout {
    array_stride: 12,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    }],
}];

// ── Bind-group layouts ────────────────────────────────────────────────────

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Bind-group layouts shared across the renderer's pipelines.
pub(crate) struct SharedLayouts {
    /// Group 0 of geometry/forward passes: frame uniforms.
    pub frame: wgpu::BindGroupLayout,
    /// Group 1 of geometry/forward passes: per-draw model uniforms.
    pub model: wgpu::BindGroupLayout,
    /// Group 2 of geometry/forward passes: surface texture + sampler.
    pub texture: wgpu::BindGroupLayout,
    /// Group 0 of the depth pass.
    pub depth_frame: wgpu::BindGroupLayout,
    /// Group 0 of the light pass: uniforms + G-buffer attachments.
    pub light_frame: wgpu::BindGroupLayout,
    /// Group 1 of the light pass: the packed light array.
    pub light_storage: wgpu::BindGroupLayout,
    /// Group 2 of the shadowed light pass: shadow map + sampler.
    pub shadow_map: wgpu::BindGroupLayout,
    /// Single group of blit-style passes: source texture + sampler.
    pub blit: wgpu::BindGroupLayout,
}

impl SharedLayouts {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });

        let model = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Texture Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let depth_frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Depth Frame Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });

        let light_frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Frame Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                sampler_entry(4),
            ],
        });

        let light_storage = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Storage Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let shadow_map = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Map Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let blit = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        Self {
            frame,
            model,
            texture,
            depth_frame,
            light_frame,
            light_storage,
            shadow_map,
            blit,
        }
    }
}

// ── Pipeline sets ─────────────────────────────────────────────────────────

const GEOMETRY_DEPTH: wgpu::DepthStencilState = wgpu::DepthStencilState {
    format: gbuffer::formats::DEPTH,
    depth_write_enabled: true,
    depth_compare: wgpu::CompareFunction::Less,
    stencil: wgpu::StencilState {
        front: wgpu::StencilFaceState::IGNORE,
        back: wgpu::StencilFaceState::IGNORE,
        read_mask: 0,
        write_mask: 0,
    },
    bias: wgpu::DepthBiasState {
        constant: 0,
        slope_scale: 0.0,
        clamp: 0.0,
    },
};

fn primitive_state(topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology,
        ..Default::default()
    }
}

/// G-buffer-writing pipelines.
pub(crate) struct GeometryPipelines {
    object: [wgpu::RenderPipeline; 3],
    pub mesh: wgpu::RenderPipeline,
}

impl GeometryPipelines {
    pub fn new(gpu: &GpuContext, shader: &Shader, layouts: &SharedLayouts) -> Self {
        let device = &gpu.device;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GBuffer Pipeline Layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.model, &layouts.texture],
            push_constant_ranges: &[],
        });

        let targets = [
            Some(wgpu::ColorTargetState {
                format: gbuffer::formats::POSITION,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: gbuffer::formats::NORMAL,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: gbuffer::formats::ALBEDO_SPEC,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
        ];

        let build = |entry: &str,
                     buffers: &[wgpu::VertexBufferLayout<'_>],
                     topology: wgpu::PrimitiveTopology,
                     label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: shader.module(),
                    entry_point: Some(entry),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader.module(),
                    entry_point: Some("fs_main"),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: primitive_state(topology),
                depth_stencil: Some(GEOMETRY_DEPTH),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let object = Primitive::ALL.map(|p| {
            build(
                "vs_object",
                &OBJECT_LAYOUTS,
                p.topology(),
                "GBuffer Object Pipeline",
            )
        });
        let mesh = build(
            "vs_mesh",
            &[Vertex3d::LAYOUT],
            wgpu::PrimitiveTopology::TriangleList,
            "GBuffer Mesh Pipeline",
        );

        Self { object, mesh }
    }

    pub fn object(&self, primitive: Primitive) -> &wgpu::RenderPipeline {
        &self.object[primitive.index()]
    }
}

/// Shadow depth pipelines. Depth-only: no fragment stage.
pub(crate) struct DepthPipelines {
    object: [wgpu::RenderPipeline; 3],
    pub mesh: wgpu::RenderPipeline,
}

impl DepthPipelines {
    pub fn new(gpu: &GpuContext, shader: &Shader, layouts: &SharedLayouts) -> Self {
        let device = &gpu.device;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Depth Pipeline Layout"),
            bind_group_layouts: &[&layouts.depth_frame],
            push_constant_ranges: &[],
        });

        let build = |buffers: &[wgpu::VertexBufferLayout<'_>],
                     topology: wgpu::PrimitiveTopology,
                     label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: shader.module(),
                    entry_point: Some("vs_main"),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: None,
                primitive: primitive_state(topology),
                depth_stencil: Some(GEOMETRY_DEPTH),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let object = Primitive::ALL
            .map(|p| build(&POSITION_LAYOUT, p.topology(), "Shadow Object Pipeline"));
        let mesh = build(
            &[Vertex3d::LAYOUT],
            wgpu::PrimitiveTopology::TriangleList,
            "Shadow Mesh Pipeline",
        );

        Self { object, mesh }
    }

    pub fn object(&self, primitive: Primitive) -> &wgpu::RenderPipeline {
        &self.object[primitive.index()]
    }
}

/// Forward pipelines for the immediate path, drawing into the scene
/// target with depth testing against the resolved deferred depth.
pub(crate) struct ForwardPipelines {
    object: [wgpu::RenderPipeline; 3],
    pub mesh: wgpu::RenderPipeline,
}

impl ForwardPipelines {
    pub fn new(gpu: &GpuContext, shader: &Shader, layouts: &SharedLayouts) -> Self {
        let device = &gpu.device;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Forward Pipeline Layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.model, &layouts.texture],
            push_constant_ranges: &[],
        });

        let build = |entry: &str,
                     buffers: &[wgpu::VertexBufferLayout<'_>],
                     topology: wgpu::PrimitiveTopology,
                     label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: shader.module(),
                    entry_point: Some(entry),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader.module(),
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: SCENE_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: primitive_state(topology),
                depth_stencil: Some(GEOMETRY_DEPTH),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let object = Primitive::ALL.map(|p| {
            build(
                "vs_object",
                &OBJECT_LAYOUTS,
                p.topology(),
                "Forward Object Pipeline",
            )
        });
        let mesh = build(
            "vs_mesh",
            &[Vertex3d::LAYOUT],
            wgpu::PrimitiveTopology::TriangleList,
            "Forward Mesh Pipeline",
        );

        Self { object, mesh }
    }

    pub fn object(&self, primitive: Primitive) -> &wgpu::RenderPipeline {
        &self.object[primitive.index()]
    }
}

/// The two light-accumulation pipelines: with and without shadow sampling.
pub(crate) struct LightPipelines {
    pub plain: wgpu::RenderPipeline,
    pub shadowed: wgpu::RenderPipeline,
}

impl LightPipelines {
    pub fn new(gpu: &GpuContext, shader: &Shader, layouts: &SharedLayouts) -> Self {
        let device = &gpu.device;

        let build = |entry: &str, groups: &[&wgpu::BindGroupLayout], label: &str| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: groups,
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: shader.module(),
                    entry_point: Some("vs_main"),
                    buffers: &QUAD_LAYOUTS,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader.module(),
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: SCENE_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: primitive_state(wgpu::PrimitiveTopology::TriangleStrip),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let plain = build(
            "fs_light",
            &[&layouts.light_frame, &layouts.light_storage],
            "Light Pipeline",
        );
        let shadowed = build(
            "fs_shadow",
            &[&layouts.light_frame, &layouts.light_storage, &layouts.shadow_map],
            "Shadowed Light Pipeline",
        );

        Self { plain, shadowed }
    }
}

/// Builds a full-screen copy pipeline targeting `format`.
pub(crate) fn blit_pipeline(
    gpu: &GpuContext,
    shader: &Shader,
    layouts: &SharedLayouts,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    let device = &gpu.device;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&layouts.blit],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader.module(),
            entry_point: Some("vs_main"),
            buffers: &QUAD_LAYOUTS,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader.module(),
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: primitive_state(wgpu::PrimitiveTopology::TriangleStrip),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

// ── Bind-group helpers ────────────────────────────────────────────────────

/// Creates a single-uniform bind group backed by a transient buffer.
/// The render pass keeps both alive for the frame.
pub(crate) fn uniform_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    contents: &[u8],
    label: &str,
) -> wgpu::BindGroup {
    use wgpu::util::DeviceExt;
    let buffer = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::UNIFORM,
        });
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// Creates the G-buffer attachment bind group for the light pass.
pub(crate) fn light_frame_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    uniforms: &LightPassUniforms,
    gbuffer: &GBuffer,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    use wgpu::util::DeviceExt;
    let buffer = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Pass Uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Light Frame Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&gbuffer.position_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&gbuffer.normal_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&gbuffer.albedo_spec_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
