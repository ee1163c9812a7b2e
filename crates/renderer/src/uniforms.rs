//! Per-slot global uniform buffers and their descriptor sets.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use cadence_rhi::{BufferUsage, DescriptorKind, GraphicsBackend, RhiError, RhiResult};

use crate::descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
use crate::ubo::GlobalUbo;

/// Binding of [`GlobalUbo`] in the global set layout.
pub const GLOBAL_UBO_BINDING: u32 = 0;

/// One [`GlobalUbo`] buffer and descriptor set per frame slot.
///
/// Slot `i` is only rewritten while frame slot `i` is being recorded, after
/// the chain has waited for that slot's previous submission.
pub struct GlobalUniforms<B: GraphicsBackend> {
    sets: Vec<B::DescriptorSet>,
    buffers: Vec<B::Buffer>,
    pool: DescriptorPool<B>,
    layout: DescriptorSetLayout<B>,
    backend: Arc<B>,
}

impl<B: GraphicsBackend> GlobalUniforms<B> {
    /// Creates the layout, a pool sized for `frames_in_flight` sets, and one
    /// buffer and set per slot.
    ///
    /// # Errors
    ///
    /// Fails on any backend error, or if the pool cannot hold a set per slot.
    pub fn new(backend: Arc<B>, frames_in_flight: usize) -> RhiResult<Self> {
        let layout = DescriptorSetLayout::builder(&backend)
            .add_binding(
                GLOBAL_UBO_BINDING,
                DescriptorKind::UniformBuffer,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .build()?;
        let mut pool = DescriptorPool::builder(&backend)
            .max_sets(frames_in_flight as u32)
            .pool_size(DescriptorKind::UniformBuffer, frames_in_flight as u32)
            .build()?;

        let mut buffers = Vec::with_capacity(frames_in_flight);
        let mut sets = Vec::with_capacity(frames_in_flight);
        for slot in 0..frames_in_flight {
            let buffer = backend.create_buffer(BufferUsage::Uniform, GlobalUbo::SIZE as u64)?;
            let set = DescriptorWriter::new(&layout, &mut pool)
                .write_buffer(GLOBAL_UBO_BINDING, backend.buffer_info(&buffer))
                .build()?
                .ok_or_else(|| {
                    RhiError::DescriptorError(format!(
                        "no descriptor set available for frame slot {slot}"
                    ))
                })?;
            buffers.push(buffer);
            sets.push(set);
        }

        debug!("Created global uniforms for {} frame slot(s)", frames_in_flight);

        Ok(Self {
            sets,
            buffers,
            pool,
            layout,
            backend,
        })
    }

    /// Uploads `ubo` into the buffer of `slot`.
    pub fn update(&self, slot: usize, ubo: &GlobalUbo) -> RhiResult<()> {
        self.backend
            .write_buffer(&self.buffers[slot], 0, bytemuck::bytes_of(ubo))
    }

    /// Descriptor set bound to `slot`'s buffer.
    #[inline]
    pub fn set(&self, slot: usize) -> B::DescriptorSet {
        self.sets[slot]
    }

    #[inline]
    pub fn layout(&self) -> &DescriptorSetLayout<B> {
        &self.layout
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn pool(&self) -> &DescriptorPool<B> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockCommand};
    use glam::{Mat4, Vec3};

    #[test]
    fn test_one_set_per_slot() {
        let backend = Arc::new(MockBackend::new());
        let uniforms = GlobalUniforms::new(backend.clone(), 3).unwrap();

        assert_eq!(uniforms.slot_count(), 3);
        assert_eq!(uniforms.pool().live_sets(), 3);
        assert_eq!(uniforms.pool().remaining(DescriptorKind::UniformBuffer), 0);
        assert_ne!(uniforms.set(0), uniforms.set(1));

        let updates = backend
            .log()
            .into_iter()
            .filter(|c| matches!(c, MockCommand::UpdateDescriptorSet { .. }))
            .count();
        assert_eq!(updates, 3);
    }

    #[test]
    fn test_update_writes_slot_buffer() {
        let backend = Arc::new(MockBackend::new());
        let uniforms = GlobalUniforms::new(backend.clone(), 2).unwrap();
        backend.clear_log();

        let ubo = GlobalUbo::new(Mat4::IDENTITY, Vec3::Y);
        uniforms.update(1, &ubo).unwrap();

        match backend.log().as_slice() {
            [MockCommand::WriteBuffer { offset, data, .. }] => {
                assert_eq!(*offset, 0);
                assert_eq!(data.as_slice(), bytemuck::bytes_of(&ubo));
            }
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn test_exhausted_device_pool_is_an_error() {
        let backend = Arc::new(MockBackend::new());
        backend.set_descriptor_pool_full(true);

        let result = GlobalUniforms::new(backend, 2);
        assert!(matches!(result, Err(RhiError::DescriptorError(_))));
    }
}
