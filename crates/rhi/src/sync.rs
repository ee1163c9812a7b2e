//! Synchronization primitives.
//!
//! - [`Semaphore`] orders GPU work between acquire, submit and present.
//! - [`Fence`] lets the host wait for a submission to retire.
//! - [`SlotSync`] bundles the objects owned by one frame slot.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore wrapper.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled so the first wait returns at once.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled.
    pub fn wait(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, u64::MAX)?
        };
        Ok(())
    }

    /// Returns the fence to the unsignaled state. It must not be pending.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Per-frame-slot synchronization.
///
/// `image_available` is signaled by acquire and waited on by submit.
/// `in_flight` is signaled when the slot's submission retires.
pub struct SlotSync {
    pub image_available: Semaphore,
    pub in_flight: Fence,
}

impl SlotSync {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Creates `count` slots.
    pub fn create_many(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Self>> {
        let slots = (0..count)
            .map(|_| Self::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created synchronization for {} frame slot(s)", count);
        Ok(slots)
    }
}
