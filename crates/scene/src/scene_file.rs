//! JSON scene descriptions.
//!
//! A scene file lists entities by cached geometry name or by mesh file:
//!
//! ```json
//! {
//!   "entities": [
//!     { "geometry": "cube", "position": [0.0, 0.0, 2.5], "scale": [0.5, 0.5, 0.5] },
//!     { "mesh": "models/pyramid.obj", "position": [1.0, 0.0, 2.5],
//!       "rotation": [0.0, 0.8, 0.0], "color": [0.9, 0.2, 0.2] }
//!   ]
//! }
//! ```
//!
//! Geometry names are resolved against a [`GeometryCache`]. Mesh files are
//! loaded through a caller-supplied loader and cached under their resolved
//! path, so the scene crate never touches GPU resources.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::entity::{Entity, EntityFactory};
use crate::geometry_cache::GeometryCache;
use crate::transform::Transform;

/// Errors raised while reading or instantiating a scene file.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scene file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An entity names geometry that is not in the cache
    #[error("entity {index} references unknown geometry '{name}'")]
    UnknownGeometry { index: usize, name: String },

    #[error("entity {index} sets both 'geometry' and 'mesh'")]
    ConflictingGeometry { index: usize },

    #[error("entity {index} failed to load mesh '{}': {source}", .path.display())]
    MeshLoad {
        index: usize,
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// One entity as written in a scene file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDesc {
    /// Geometry cache key.
    #[serde(default)]
    pub geometry: Option<String>,
    /// Mesh file, relative to the scene file's directory. Entities with
    /// neither `geometry` nor `mesh` are created but not drawn.
    #[serde(default)]
    pub mesh: Option<PathBuf>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "unit_vector")]
    pub scale: [f32; 3],
    /// Euler angles in radians.
    #[serde(default)]
    pub rotation: [f32; 3],
    /// Tint multiplied into the vertex colors.
    #[serde(default = "unit_vector")]
    pub color: [f32; 3],
}

fn unit_vector() -> [f32; 3] {
    [1.0; 3]
}

impl EntityDesc {
    pub fn transform(&self) -> Transform {
        Transform::new()
            .with_translation(Vec3::from_array(self.position))
            .with_scale(Vec3::from_array(self.scale))
            .with_rotation(Vec3::from_array(self.rotation))
    }
}

/// Parsed scene file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFile {
    pub entities: Vec<EntityDesc>,
    /// Directory relative mesh paths resolve against.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl SceneFile {
    /// Parses a scene. Relative mesh paths resolve against the working directory.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a scene file. Relative mesh paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut scene = Self::from_json(&json)?;
        scene.base_dir = path.parent().map(Path::to_path_buf);
        tracing::info!(
            "Loaded scene {} ({} entities)",
            path.display(),
            scene.entities.len()
        );
        Ok(scene)
    }

    /// Where a mesh file named in this scene lives.
    pub fn mesh_path(&self, file: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// Creates one entity per description, in file order.
    ///
    /// Mesh files go through `load_mesh` once per resolved path and are
    /// cached in `geometry` under that path. Every entry is resolved before
    /// any entity is created, so a failed spawn consumes no ids.
    pub fn spawn<G, E>(
        &self,
        factory: &mut EntityFactory,
        geometry: &mut GeometryCache<G>,
        mut load_mesh: impl FnMut(&Path) -> Result<G, E>,
    ) -> Result<Vec<Entity<G>>, SceneError>
    where
        E: StdError + Send + Sync + 'static,
    {
        let mut handles = Vec::with_capacity(self.entities.len());
        for (index, desc) in self.entities.iter().enumerate() {
            let handle = match (&desc.geometry, &desc.mesh) {
                (Some(_), Some(_)) => return Err(SceneError::ConflictingGeometry { index }),
                (Some(name), None) => Some(geometry.get(name).ok_or_else(|| {
                    SceneError::UnknownGeometry {
                        index,
                        name: name.clone(),
                    }
                })?),
                (None, Some(file)) => {
                    let path = self.mesh_path(file);
                    let key = path.to_string_lossy().into_owned();
                    let handle = geometry
                        .get_or_insert_with(&key, || load_mesh(&path))
                        .map_err(|e| SceneError::MeshLoad {
                            index,
                            path: path.clone(),
                            source: Box::new(e),
                        })?;
                    Some(handle)
                }
                (None, None) => None,
            };
            handles.push(handle);
        }

        Ok(self
            .entities
            .iter()
            .zip(handles)
            .map(|(desc, handle)| {
                let mut entity = factory
                    .create::<G>()
                    .with_color(Vec3::from_array(desc.color))
                    .with_transform(desc.transform());
                entity.geometry = handle;
                entity
            })
            .collect())
    }
}
