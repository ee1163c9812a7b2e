//! Vulkan logical device, queues and memory allocator.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Shared through `Arc` by every object that needs to destroy itself.
/// The allocator is behind a `Mutex`; allocation happens off the hot path
/// (buffer and depth image creation) so contention is not a concern.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_family: u32,
    present_family: u32,
    max_push_constants_size: u32,
}

impl Device {
    /// Creates the logical device with dynamic rendering enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> Result<Arc<Self>, RhiError> {
        let mut families = vec![info.graphics_family];
        if info.present_family != info.graphics_family {
            families.push(info.present_family);
        }

        let priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(info.device, &create_info, None)?
        };
        info!("Logical device created for '{}'", info.device_name());

        let graphics_queue = unsafe { device.get_device_queue(info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(info.present_family, 0) };
        debug!(
            "Queues retrieved (graphics family {}, present family {})",
            info.graphics_family, info.present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(Arc::new(Self {
            device,
            physical_device: info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            graphics_family: info.graphics_family,
            present_family: info.present_family,
            max_push_constants_size: info.max_push_constants_size(),
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    #[inline]
    pub fn present_family(&self) -> u32 {
        self.present_family
    }

    #[inline]
    pub fn max_push_constants_size(&self) -> u32 {
        self.max_push_constants_size
    }

    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Blocks until all queues are idle.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, queues are plain handles and the
// allocator is guarded by a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
