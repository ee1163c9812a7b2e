//! Vulkan presentation chain.
//!
//! [`VulkanChain`] owns everything whose lifetime is tied to one
//! `VkSwapchainKHR`: the images and their views, the depth attachment, the
//! per-slot acquire synchronization and the per-image render-finished
//! semaphores. A rebuild creates a new chain from the previous one and drops
//! the previous one afterwards.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::backend::{AcquiredImage, ChainStatus, PresentationChain};
use crate::command::cmd_transition_image_layout;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{DEPTH_FORMAT, DepthImage};
use crate::instance::Instance;
use crate::surface::Surface;
use crate::sync::{Semaphore, SlotSync};

/// Surface capabilities, formats and present modes for one device.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> Result<Self, RhiError> {
        let loader = surface.loader();
        let handle = surface.handle();

        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(physical_device, handle)? };
        let formats =
            unsafe { loader.get_physical_device_surface_formats(physical_device, handle)? };
        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(physical_device, handle)? };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Swapchain plus the per-image and per-slot resources tied to it.
pub struct VulkanChain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth: DepthImage,
    format: vk::Format,
    extent: vk::Extent2D,
    slots: Vec<SlotSync>,
    render_finished: Vec<Semaphore>,
    /// Fence of the slot that last rendered into each image.
    images_in_flight: Vec<vk::Fence>,
}

impl VulkanChain {
    /// Creates a chain for `surface`.
    ///
    /// When `previous` is given its swapchain is handed to the driver as
    /// `oldSwapchain`; `previous` itself stays valid until the caller drops it.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        requested: vk::Extent2D,
        frames_in_flight: usize,
        previous: Option<&VulkanChain>,
    ) -> RhiResult<Self> {
        let support = SwapchainSupportDetails::query(device.physical_device(), surface)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, requested.width, requested.height);
        let min_image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, min {} images",
            extent.width, extent.height, surface_format.format, present_mode, min_image_count
        );

        let queue_family_indices = [device.graphics_family(), device.present_family()];
        let (sharing_mode, shared_families) =
            if device.graphics_family() != device.present_family() {
                (vk::SharingMode::CONCURRENT, &queue_family_indices[..])
            } else {
                (vk::SharingMode::EXCLUSIVE, &[][..])
            };

        let old_swapchain = previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        // From here on the partially built chain cleans up after itself.
        let mut chain = Self {
            depth: DepthImage::new(device.clone(), extent).inspect_err(|_| unsafe {
                loader.destroy_swapchain(swapchain, None)
            })?,
            device,
            loader,
            swapchain,
            image_views: Vec::with_capacity(images.len()),
            images_in_flight: vec![vk::Fence::null(); images.len()],
            images,
            format: surface_format.format,
            extent,
            slots: Vec::new(),
            render_finished: Vec::new(),
        };

        chain.create_image_views()?;
        chain.slots = SlotSync::create_many(&chain.device, frames_in_flight)?;
        chain.render_finished = (0..chain.images.len())
            .map(|_| Semaphore::new(chain.device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Swapchain created with {} images for {} frame slot(s)",
            chain.images.len(),
            frames_in_flight
        );

        Ok(chain)
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        DEPTH_FORMAT
    }

    fn create_image_views(&mut self) -> RhiResult<()> {
        for (i, &image) in self.images.iter().enumerate() {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            let view = unsafe {
                self.device
                    .handle()
                    .create_image_view(&create_info, None)
                    .map_err(|e| {
                        RhiError::SwapchainError(format!(
                            "failed to create image view {i}: {e:?}"
                        ))
                    })?
            };
            self.image_views.push(view);
        }

        debug!("Created {} image views", self.image_views.len());
        Ok(())
    }

    fn slot(&self, frame_slot: usize) -> RhiResult<&SlotSync> {
        self.slots.get(frame_slot).ok_or_else(|| {
            RhiError::SwapchainError(format!(
                "frame slot {frame_slot} out of range ({} slots)",
                self.slots.len()
            ))
        })
    }
}

impl PresentationChain for VulkanChain {
    type CommandBuffer = vk::CommandBuffer;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn is_compatible_with(&self, other: &Self) -> bool {
        self.format == other.format && self.depth_format() == other.depth_format()
    }

    fn acquire_next_image(&mut self, frame_slot: usize) -> RhiResult<AcquiredImage> {
        let slot = self.slot(frame_slot)?;
        slot.in_flight.wait()?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                slot.image_available.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok(AcquiredImage::Ready(index)),
            Ok((index, true)) => Ok(AcquiredImage::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        frame_slot: usize,
    ) -> RhiResult<ChainStatus> {
        let image = image_index as usize;
        let slot_fence = self.slot(frame_slot)?.in_flight.handle();

        let previous_fence = self.images_in_flight[image];
        if previous_fence != vk::Fence::null() && previous_fence != slot_fence {
            unsafe {
                self.device
                    .handle()
                    .wait_for_fences(&[previous_fence], true, u64::MAX)?
            };
        }
        self.images_in_flight[image] = slot_fence;

        let slot = self.slot(frame_slot)?;
        let wait_semaphores = [slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [self.render_finished[image].handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        slot.in_flight.reset()?;
        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot_fence,
            )?
        };

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.loader
                .queue_present(self.device.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(ChainStatus::Success),
            Ok(true) => Ok(ChainStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(ChainStatus::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn begin_rendering(&self, cmd: vk::CommandBuffer, image_index: u32, clear_color: [f32; 4]) {
        let image = image_index as usize;

        cmd_transition_image_layout(
            &self.device,
            cmd,
            self.images[image],
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        cmd_transition_image_layout(
            &self.device,
            cmd,
            self.depth.image(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::DEPTH,
        );

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(self.image_views[image])
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            })];

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(cmd, &rendering_info);
        }
    }

    fn end_rendering(&self, cmd: vk::CommandBuffer, image_index: u32) {
        unsafe {
            self.device.handle().cmd_end_rendering(cmd);
        }
        cmd_transition_image_layout(
            &self.device,
            cmd,
            self.images[image_index as usize],
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );
    }
}

impl Drop for VulkanChain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("Swapchain destroyed ({}x{})", self.extent.width, self.extent.height);
    }
}

/// Prefers `B8G8R8A8_SRGB`, then `B8G8R8A8_UNORM`, then whatever comes first.
///
/// `formats` must not be empty.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let find = |format: vk::Format| {
        formats.iter().copied().find(|f| {
            f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    };

    if let Some(format) = find(vk::Format::B8G8R8A8_SRGB) {
        return format;
    }
    if let Some(format) = find(vk::Format::B8G8R8A8_UNORM) {
        warn!("Using fallback surface format: B8G8R8A8_UNORM");
        return format;
    }

    warn!("Using first available surface format: {:?}", formats[0].format);
    formats[0]
}

/// MAILBOX when available, otherwise FIFO (always supported).
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Uses the surface's current extent, or clamps the requested size when the
/// surface leaves it to the swapchain (`u32::MAX`).
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped at the maximum when there is one.
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn test_choose_surface_format_fallbacks() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::B8G8R8A8_UNORM
        );

        let formats = [surface_format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);

        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((extent.width, extent.height), (2000, 2000));

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!((extent.width, extent.height), (100, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_determine_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped), 2);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unlimited), 3);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let details = |formats: usize, modes: usize| SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default(); formats],
            present_modes: vec![vk::PresentModeKHR::FIFO; modes],
        };
        assert!(details(1, 1).is_adequate());
        assert!(!details(0, 1).is_adequate());
        assert!(!details(1, 0).is_adequate());
    }
}
