//! Geometry handles.
//!
//! A [`Mesh`] owns a vertex buffer and an optional index buffer. Entities
//! share meshes through `Arc`, so the buffers live as long as the last
//! entity or cache entry holding them.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use cadence_rhi::{BufferUsage, GraphicsBackend, RhiError, RhiResult, Vertex};

use crate::model::{MeshData, ModelResult};

/// Immutable vertex (and index) data on the GPU.
pub struct Mesh<B: GraphicsBackend> {
    vertex_buffer: B::Buffer,
    vertex_count: u32,
    index_buffer: Option<B::Buffer>,
    index_count: u32,
    backend: Arc<B>,
}

impl<B: GraphicsBackend> Mesh<B> {
    /// Uploads `vertices` and, when `indices` is non-empty, an index buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::BufferError`] for fewer than three vertices, and
    /// any buffer creation error.
    pub fn new(backend: Arc<B>, vertices: &[Vertex], indices: &[u32]) -> RhiResult<Self> {
        if vertices.len() < 3 {
            return Err(RhiError::BufferError(format!(
                "a mesh needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = backend.create_buffer(BufferUsage::Vertex, vertex_bytes.len() as u64)?;
        backend.write_buffer(&vertex_buffer, 0, vertex_bytes)?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            let index_bytes: &[u8] = bytemuck::cast_slice(indices);
            let buffer = backend.create_buffer(BufferUsage::Index, index_bytes.len() as u64)?;
            backend.write_buffer(&buffer, 0, index_bytes)?;
            Some(buffer)
        };

        debug!(
            "Created mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            index_buffer,
            index_count: indices.len() as u32,
            backend,
        })
    }

    /// Loads an OBJ file and uploads it.
    pub fn from_file(backend: Arc<B>, path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let data = MeshData::load(path)?;
        let mesh = Self::new(backend, &data.vertices, &data.indices)?;
        info!("Mesh loaded from {}", path.display());
        Ok(mesh)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Binds the vertex buffer, and the index buffer if there is one.
    pub fn bind(&self, cmd: B::CommandBuffer) {
        self.backend.cmd_bind_vertex_buffer(cmd, &self.vertex_buffer);
        if let Some(index_buffer) = &self.index_buffer {
            self.backend.cmd_bind_index_buffer(cmd, index_buffer);
        }
    }

    /// Draws the whole mesh. Must follow [`bind`](Self::bind).
    pub fn draw(&self, cmd: B::CommandBuffer) {
        if self.is_indexed() {
            self.backend.cmd_draw_indexed(cmd, self.index_count);
        } else {
            self.backend.cmd_draw(cmd, self.vertex_count);
        }
    }
}
