//! # Pharos
//!
//! **A deferred-shading 3D rendering core for Rust that gets out of your way.**
//!
//! Pharos is a scene-graph-free, immediate-style rendering pipeline:
//! register objects in a flat [`RenderList`], hand the list to the
//! [`DeferredRenderer`] once per frame, and it runs the fixed pass chain:
//! G-buffer geometry, optional shadow depth, full-screen light
//! accumulation from a GPU-resident light array, depth resolve for
//! forward draws, optional bloom, present.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pharos::*;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> Result<(), EngineError> {
//! let gpu = GpuContext::new(window);
//! let mut renderer = DeferredRenderer::new(&gpu)?;
//! let mut tracker = ResourceTracker::new();
//! renderer.register_resources(&mut tracker);
//!
//! let mut list = RenderList::new();
//! list.push(Box::new(SolidObject::cube(2.0, Color::rgb(0.8, 0.2, 0.2))));
//!
//! let camera = Camera::default().at(0.0, 3.0, 8.0).looking_at(0.0, 0.0, 0.0);
//! let mut env = LightEnvironment::default();
//! env.push(Light::new(
//!     Color::WHITE,
//!     Color::WHITE,
//!     Vec3::new(4.0, 6.0, 4.0),
//!     40.0,
//!     0.05,
//!     1.0,
//! ));
//!
//! // Per frame:
//! renderer.render_with_lights(&gpu, &camera, &mut list, &env, Color::BLACK)?;
//! renderer.present(&gpu)?;
//!
//! // At shutdown, while the context is still valid:
//! tracker.cleanup_all();
//! # Ok(()) }
//! ```
//!
//! ## Design
//!
//! - **Flat render lists** — draw order is insertion order; no scene
//!   graph, no sorting, no batching.
//! - **One capability, three operations** — anything implementing
//!   [`Renderable`] participates in the deferred, shadow, and immediate
//!   paths.
//! - **Deterministic resource lifetimes** — every GPU wrapper releases on
//!   drop, and the [`ResourceTracker`] sweeps process-lifetime resources
//!   exactly once at shutdown.

pub mod bloom;
mod camera;
mod color;
pub mod deferred;
mod error;
pub mod geometry;
mod gpu;
pub mod light;
mod mesh_object;
mod object_buffer;
mod render_object;
mod shader;
mod shadow;
mod solid_object;
mod texture;
mod tracker;
mod transform;
mod vector_object;

pub use bloom::{Bloom, BloomOptions, generate_weights};
pub use camera::Camera;
pub use color::Color;
pub use deferred::frames::{DepthFrame, ForwardFrame, GeometryFrame};
pub use deferred::schedule::{PassStage, frame_schedule};
pub use deferred::{DEFAULT_SHADOW_MAP_SIZE, DeferredRenderer};
pub use error::EngineError;
pub use geometry::{GeometryError, RawGeometry, Vertex3d};
pub use gpu::GpuContext;
pub use light::{Light, LightEnvironment, MAX_LIGHTS, PackedLight, pack_lights};
pub use mesh_object::{MeshBuffer, MeshObject};
pub use object_buffer::{ObjectBuffer, Primitive, VertexStreams};
pub use render_object::{RenderList, Renderable};
pub use shader::Shader;
pub use shadow::ShadowView;
pub use solid_object::SolidObject;
pub use texture::{Crop, Texture};
pub use tracker::{GpuResource, ResourceTracker};
pub use transform::Transform;
pub use vector_object::VectorObject;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
