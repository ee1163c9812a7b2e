//! Presentation surface ownership.

use ash::vk;

use crate::instance::Instance;

/// Owns a `VkSurfaceKHR` created by the platform layer.
///
/// The instance the surface was created from must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Takes ownership of `handle`, which must come from `instance`.
    pub fn from_raw(instance: &Instance, handle: vk::SurfaceKHR) -> Self {
        Self {
            handle,
            loader: ash::khr::surface::Instance::new(instance.entry(), instance.handle()),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created from the same instance as the
        // loader, and nothing else destroys it.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}
