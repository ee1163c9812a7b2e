//! Physical device (GPU) selection.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue families needed to render and present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        families.extend(self.graphics_family);
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// A GPU that satisfies the renderer's requirements.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub graphics_family: u32,
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Device limit on the push-constant block size.
    #[inline]
    pub fn max_push_constants_size(&self) -> u32 {
        self.properties.limits.max_push_constants_size
    }
}

/// Picks the highest-rated GPU that can render to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device has graphics and
/// present queues, swapchain support and Vulkan 1.3.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .max_by_key(|info| rate_device_type(info.properties.device_type));

    match selected {
        Some(info) => {
            info!(
                "Selected GPU: '{}' ({:?})",
                info.device_name(),
                info.properties.device_type
            );
            Ok(info)
        }
        None => {
            warn!("No suitable GPU found");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };

    if vk::api_version_major(properties.api_version) == 1
        && vk::api_version_minor(properties.api_version) < 3
    {
        debug!("GPU skipped: Vulkan 1.3 not supported");
        return None;
    }

    let families = find_queue_families(instance, device, surface, surface_loader);
    let (Some(graphics_family), Some(present_family)) =
        (families.graphics_family, families.present_family)
    else {
        debug!("GPU skipped: missing graphics or present queue family");
        return None;
    };

    let has_swapchain = unsafe { instance.enumerate_device_extension_properties(device) }
        .map(|extensions| {
            extensions.iter().any(|ext| {
                ext.extension_name_as_c_str()
                    .is_ok_and(|name| name == ash::khr::swapchain::NAME)
            })
        })
        .unwrap_or(false);
    if !has_swapchain {
        debug!("GPU skipped: VK_KHR_swapchain not supported");
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        graphics_family,
        present_family,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }
        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }
        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if present_support {
                indices.present_family = Some(i);
            }
        }
        if indices.is_complete() {
            break;
        }
    }

    indices
}

fn rate_device_type(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert!(!QueueFamilyIndices::default().is_complete());
    }

    #[test]
    fn test_unique_families_dedupes() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_discrete_gpu_rated_highest() {
        assert!(
            rate_device_type(vk::PhysicalDeviceType::DISCRETE_GPU)
                > rate_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            rate_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU)
                > rate_device_type(vk::PhysicalDeviceType::CPU)
        );
    }
}
