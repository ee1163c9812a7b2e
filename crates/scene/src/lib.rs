//! Scene entity model.
//!
//! This crate provides the CPU-side description of what gets drawn:
//! - Entities with shared geometry handles, a color and a transform
//! - The factory that assigns entity ids
//! - A name-keyed geometry cache
//! - Camera matrices
//! - JSON scene files

pub mod camera;
pub mod entity;
pub mod geometry_cache;
pub mod scene_file;
pub mod transform;

pub use camera::Camera;
pub use entity::{Entity, EntityFactory, EntityId};
pub use geometry_cache::GeometryCache;
pub use scene_file::{EntityDesc, SceneError, SceneFile};
pub use transform::Transform;
