//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! The frame, descriptor and draw code in `cadence-renderer` is written
//! against the [`GraphicsBackend`] and [`PresentationChain`] traits.
//! [`VulkanBackend`] implements them on top of `ash`:
//! - Instance, surface and device creation
//! - Swapchain management with per-slot and per-image synchronization
//! - Command buffer recording
//! - Descriptor layouts and pools
//! - Host-visible buffers and the depth attachment
//! - Dynamic-rendering graphics pipelines

mod error;

pub mod backend;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vertex;
pub mod vulkan;

pub use backend::{
    AcquiredImage, ChainStatus, DescriptorKind, DescriptorResource, DescriptorWrite,
    GraphicsBackend, GraphicsPipelineDesc, LayoutBinding, PoolSize, PresentationChain,
};
pub use buffer::BufferUsage;
pub use error::{RhiError, RhiResult};
pub use vertex::Vertex;
pub use vulkan::VulkanBackend;

pub use ash::vk;
