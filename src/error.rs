//! Crate-wide error type for the rendering core.
//!
//! Fallible APIs return [`EngineError`]. Unrecoverable initialization
//! failures (no GPU adapter, no device) panic at context creation instead;
//! there is nothing the caller can do about a machine without a GPU.

use thiserror::Error;

use crate::geometry::GeometryError;

/// Errors surfaced by the rendering core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A WGSL module failed validation. The log is the driver-reported
    /// diagnostic, verbatim.
    #[error("shader '{label}' failed validation:\n{log}")]
    ShaderCompile { label: String, log: String },

    /// A configuration value was rejected at the API boundary, before any
    /// GPU state was touched.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input names a feature or format the pipeline does not support.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// The surface could not provide a frame to present into.
    #[error("surface error: {0}")]
    Surface(String),

    /// Geometry import failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Image decode failed while loading a texture.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
