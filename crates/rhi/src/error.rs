//! RHI error types.

use thiserror::Error;

/// Errors raised by the rendering hardware interface.
///
/// Every variant is unrecoverable from the frame loop's point of view.
/// Recoverable presentation states (out of date, suboptimal) and descriptor
/// pool exhaustion are reported through return values instead.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No physical device satisfies the requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader module could not be loaded
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Window surface could not be created
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Presentation chain creation or rebuild failed
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline or pipeline layout creation failed
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Buffer misuse (zero size, out-of-range write, unmapped memory)
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// A descriptor set the caller cannot run without could not be allocated
    #[error("Descriptor error: {0}")]
    DescriptorError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_result_converts() {
        let err: RhiError = ash::vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(
            err,
            RhiError::VulkanError(ash::vk::Result::ERROR_DEVICE_LOST)
        ));
    }
}
