//! OBJ model loading.
//!
//! Every object in a file is flattened into one vertex list with `u32`
//! indices, ready for [`Mesh::new`](crate::Mesh::new). Materials are ignored;
//! per-vertex colors are read when present and default to white.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::debug;

use cadence_rhi::{RhiError, Vertex};

/// Errors raised while loading a model file into a mesh.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to open model file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid OBJ data: {0}")]
    Obj(#[from] tobj::LoadError),

    /// The file parsed but holds no triangles
    #[error("model has no triangles")]
    Empty,

    #[error(transparent)]
    Rhi(#[from] RhiError),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Geometry on the CPU, before upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Reads an OBJ file from disk.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = Self::from_obj(&mut BufReader::new(file))?;
        debug!(
            "Loaded {}: {} vertices, {} indices",
            path.display(),
            data.vertices.len(),
            data.indices.len()
        );
        Ok(data)
    }

    /// Parses OBJ text. Faces are triangulated and every attribute shares
    /// one index stream.
    pub fn from_obj(reader: &mut impl BufRead) -> ModelResult<Self> {
        let (models, _) = tobj::load_obj_buf(reader, &tobj::GPU_LOAD_OPTIONS, |_| {
            Ok(Default::default())
        })?;

        let mut data = Self::default();
        for model in &models {
            data.append(&model.mesh);
        }

        if data.indices.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(data)
    }

    fn append(&mut self, mesh: &tobj::Mesh) {
        let base = self.vertices.len();
        let count = mesh.positions.len() / 3;
        let has_normals = mesh.normals.len() == count * 3;
        let has_colors = mesh.vertex_color.len() == count * 3;
        let has_uvs = mesh.texcoords.len() == count * 2;

        for i in 0..count {
            let position = Vec3::from_slice(&mesh.positions[i * 3..]);
            let color = if has_colors {
                Vec3::from_slice(&mesh.vertex_color[i * 3..])
            } else {
                Vec3::ONE
            };
            let normal = if has_normals {
                Vec3::from_slice(&mesh.normals[i * 3..])
            } else {
                Vec3::ZERO
            };
            // OBJ puts the texture origin at the bottom left.
            let uv = if has_uvs {
                Vec2::new(mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1])
            } else {
                Vec2::ZERO
            };
            self.vertices.push(Vertex::new(position, color, normal, uv));
        }

        let first_index = self.indices.len();
        self.indices
            .extend(mesh.indices.iter().map(|&i| base as u32 + i));

        if !has_normals {
            self.smooth_normals(base, first_index);
        }
    }

    /// Area-weighted vertex normals for vertices `base..` from the triangles
    /// starting at `first_index`.
    fn smooth_normals(&mut self, base: usize, first_index: usize) {
        for triangle in self.indices[first_index..].chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let face = (self.vertices[b].position - self.vertices[a].position)
                .cross(self.vertices[c].position - self.vertices[a].position);
            for i in [a, b, c] {
                self.vertices[i].normal += face;
            }
        }
        for vertex in &mut self.vertices[base..] {
            vertex.normal = vertex.normal.normalize_or_zero();
        }
    }
}
