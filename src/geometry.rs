//! Imported indexed geometry and the STL loader.
//!
//! [`RawGeometry`] is the CPU-side intermediate representation mesh
//! objects are built from: interleaved vertices plus triangle indices,
//! with transform helpers applied before GPU upload. Import failures are
//! recoverable [`GeometryError`]s; they happen during asset loading,
//! before anything touches the GPU.

use std::path::Path;

use glam::{Quat, Vec3};
use thiserror::Error;

/// Errors raised while importing geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// File format could not be determined from the extension.
    #[error("unknown geometry format: '{0}'")]
    UnknownFormat(String),
    /// The geometry data was invalid or corrupt.
    #[error("parse error: {0}")]
    Parse(String),
    /// The file parsed but is missing data the pipeline needs.
    #[error("missing mesh data: {0}")]
    MissingData(String),
}

/// A vertex with position, normal, and texture coordinates.
///
/// `#[repr(C)]` for a predictable 32-byte GPU layout:
/// position at offset 0, normal at 12, uv at 24.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// The vertex buffer layout for interleaved mesh pipelines:
    /// position (loc 0), normal (loc 1), uv (loc 2).
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed geometry before GPU upload.
#[derive(Clone, Debug)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex3d>,
    /// Triangle indices, three per face.
    pub indices: Vec<u32>,
}

impl RawGeometry {
    /// Wraps vertex and index arrays, checking the minimum the pipeline
    /// needs: at least one vertex and whole triangles.
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Result<Self, GeometryError> {
        if vertices.is_empty() {
            return Err(GeometryError::MissingData("no vertices".into()));
        }
        if indices.len() % 3 != 0 {
            return Err(GeometryError::MissingData(format!(
                "index count {} is not a multiple of three",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(GeometryError::Parse(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }
        Ok(Self { vertices, indices })
    }

    /// Loads geometry from a file, picking the parser by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "stl" => Self::from_stl_file(path),
            _ => Err(GeometryError::UnknownFormat(ext)),
        }
    }

    /// Loads an STL file (binary or ASCII).
    pub fn from_stl_file(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        Self::parse_stl(&mut reader)
    }

    /// Parses STL geometry from in-memory bytes.
    pub fn from_stl_bytes(bytes: &[u8]) -> Result<Self, GeometryError> {
        let mut cursor = std::io::Cursor::new(bytes);
        Self::parse_stl(&mut cursor)
    }

    fn parse_stl<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<Self, GeometryError> {
        let stl = stl_io::read_stl(reader)
            .map_err(|e| GeometryError::Parse(format!("STL parse error: {}", e)))?;

        let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
        let mut indices = Vec::with_capacity(stl.faces.len() * 3);

        // stl_io yields a vertex list with indexed triangles; STL carries
        // no UVs, so texture coordinates stay zero.
        for (i, face) in stl.faces.iter().enumerate() {
            let normal: [f32; 3] = face.normal.into();
            for &vertex_idx in &face.vertices {
                let vertex = &stl.vertices[vertex_idx];
                let position: [f32; 3] = (*vertex).into();
                vertices.push(Vertex3d::new(position, normal, [0.0, 0.0]));
            }
            let base = (i * 3) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        Self::new(vertices, indices)
    }

    /// The axis-aligned bounding box as `(min, max)` corners.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    /// The center of the bounding box.
    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    /// The size of the bounding box.
    pub fn size(&self) -> Vec3 {
        let (min, max) = self.bounds();
        max - min
    }

    /// Translates all vertices by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for v in &mut self.vertices {
            v.position[0] += offset.x;
            v.position[1] += offset.y;
            v.position[2] += offset.z;
        }
    }

    /// Scales all vertices uniformly around the origin.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.vertices {
            v.position[0] *= factor;
            v.position[1] *= factor;
            v.position[2] *= factor;
        }
    }

    /// Rotates positions and normals by the given quaternion.
    pub fn rotate(&mut self, rotation: Quat) {
        for v in &mut self.vertices {
            v.position = (rotation * Vec3::from(v.position)).into();
            v.normal = (rotation * Vec3::from(v.normal)).into();
        }
    }

    /// Centers the geometry at the origin.
    pub fn recenter(&mut self) {
        let center = self.center();
        self.translate(-center);
    }

    /// Scales the geometry to fit within a unit cube.
    pub fn normalize(&mut self) {
        let size = self.size();
        let max_dim = size.x.max(size.y).max(size.z);
        if max_dim > 0.0 {
            self.scale(1.0 / max_dim);
        }
    }

    /// Recomputes smooth vertex normals by area-weighted averaging of the
    /// face normals sharing each vertex.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p0);

            for &i in &[i0, i1, i2] {
                self.vertices[i].normal[0] += face_normal.x;
                self.vertices[i].normal[1] += face_normal.y;
                self.vertices[i].normal[2] += face_normal.z;
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(positions: [[f32; 3]; 3]) -> RawGeometry {
        let vertices = positions
            .iter()
            .map(|&p| Vertex3d::new(p, [0.0, 1.0, 0.0], [0.0, 0.0]))
            .collect();
        RawGeometry::new(vertices, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn bounds_span_the_extremes() {
        let geom = tri([[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, -1.0, -1.0]]);
        let (min, max) = geom.bounds();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn recenter_moves_the_center_to_origin() {
        let mut geom = tri([[2.0, 2.0, 2.0], [4.0, 4.0, 4.0], [3.0, 3.0, 3.0]]);
        geom.recenter();
        assert!(geom.center().length() < 1e-3);
    }

    #[test]
    fn empty_vertices_are_missing_data() {
        assert!(matches!(
            RawGeometry::new(vec![], vec![]),
            Err(GeometryError::MissingData(_))
        ));
    }

    #[test]
    fn ragged_indices_are_missing_data() {
        let vertices = vec![Vertex3d::new([0.0; 3], [0.0; 3], [0.0; 2])];
        assert!(matches!(
            RawGeometry::new(vertices, vec![0, 0]),
            Err(GeometryError::MissingData(_))
        ));
    }

    #[test]
    fn out_of_range_index_is_a_parse_error() {
        let vertices = vec![Vertex3d::new([0.0; 3], [0.0; 3], [0.0; 2])];
        assert!(matches!(
            RawGeometry::new(vertices, vec![0, 0, 7]),
            Err(GeometryError::Parse(_))
        ));
    }

    #[test]
    fn recalculated_normals_are_unit_length() {
        let mut geom = tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        geom.recalculate_normals();
        for v in &geom.vertices {
            assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-5);
        }
    }
}
