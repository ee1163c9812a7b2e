//! Vulkan descriptor objects.
//!
//! Thin RAII wrappers over `VkDescriptorSetLayout` and `VkDescriptorPool`,
//! plus the translation from backend-neutral writes into
//! `VkWriteDescriptorSet`. Budget tracking lives one level up, in the
//! renderer's descriptor allocator.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::backend::{DescriptorResource, DescriptorWrite, LayoutBinding, PoolSize};
use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(device: Arc<Device>, bindings: &[LayoutBinding]) -> RhiResult<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.kind.to_vk())
                    .descriptor_count(b.count)
                    .stage_flags(b.stages)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Descriptor pool wrapper. Always created with `FREE_DESCRIPTOR_SET`.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(device: Arc<Device>, max_sets: u32, sizes: &[PoolSize]) -> RhiResult<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|s| {
                vk::DescriptorPoolSize::default()
                    .ty(s.kind.to_vk())
                    .descriptor_count(s.count)
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );
        Ok(Self { device, pool })
    }

    /// Allocates one set. Pool exhaustion and fragmentation map to `Ok(None)`.
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> RhiResult<Option<vk::DescriptorSet>> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => Ok(sets.into_iter().next()),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                debug!("Descriptor pool has no room for another set");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns sets to the pool. They must not be in use by the GPU.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe {
            self.device.handle().free_descriptor_sets(self.pool, sets)?;
        }
        debug!("Freed {} descriptor set(s)", sets.len());
        Ok(())
    }

    /// Returns every set to the pool.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        debug!("Reset descriptor pool");
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Applies `writes` to `set` in a single `vkUpdateDescriptorSets` call.
pub fn update_descriptor_set(
    device: &Device,
    set: vk::DescriptorSet,
    writes: &[DescriptorWrite<vk::DescriptorBufferInfo, vk::DescriptorImageInfo>],
) {
    if writes.is_empty() {
        return;
    }

    // The write structs borrow their infos, so the infos must live in
    // stable storage for the duration of the call.
    let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
        .iter()
        .map(|w| match w.resource {
            DescriptorResource::Buffer(info) => [info],
            DescriptorResource::Image(_) => [vk::DescriptorBufferInfo::default()],
        })
        .collect();
    let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = writes
        .iter()
        .map(|w| match w.resource {
            DescriptorResource::Image(info) => [info],
            DescriptorResource::Buffer(_) => [vk::DescriptorImageInfo::default()],
        })
        .collect();

    let vk_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(w.binding)
                .descriptor_type(w.kind.to_vk());
            match w.resource {
                DescriptorResource::Buffer(_) => write.buffer_info(&buffer_infos[i]),
                DescriptorResource::Image(_) => write.image_info(&image_infos[i]),
            }
        })
        .collect();

    unsafe {
        device.handle().update_descriptor_sets(&vk_writes, &[]);
    }
}

/// Descriptor info for a whole buffer.
#[inline]
pub fn buffer_info(buffer: vk::Buffer) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(0)
        .range(vk::WHOLE_SIZE)
}

/// Descriptor info for a sampled image.
#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}
