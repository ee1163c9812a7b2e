//! Frame orchestration, descriptor allocation and draw submission.
//!
//! This crate drives rendering on top of any [`GraphicsBackend`]:
//! - [`FrameOrchestrator`]: acquire, record, submit and present, plus chain rebuilds
//! - [`DescriptorSetLayout`], [`DescriptorPool`] and [`DescriptorWriter`]
//! - [`RenderSystem`]: one pipeline, per-object push constants, entity draws
//! - [`Mesh`]: shared geometry handle, built in memory or from an OBJ file
//!
//! [`GraphicsBackend`]: cadence_rhi::GraphicsBackend

pub mod descriptors;
pub mod frame;
pub mod frame_orchestrator;
pub mod mesh;
pub mod model;
pub mod render_system;
pub mod ubo;
pub mod uniforms;

#[cfg(test)]
mod mock;

pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
pub use frame::FrameContext;
pub use frame_orchestrator::FrameOrchestrator;
pub use mesh::Mesh;
pub use model::{MeshData, ModelError, ModelResult};
pub use render_system::RenderSystem;
pub use ubo::{GlobalUbo, ObjectPushConstants};
pub use uniforms::GlobalUniforms;
