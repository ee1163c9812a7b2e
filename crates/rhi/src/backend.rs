//! Backend seam between the frame/descriptor/draw core and a graphics API.
//!
//! The renderer is written against [`GraphicsBackend`] and
//! [`PresentationChain`] rather than raw Vulkan calls. [`crate::vulkan`]
//! provides the real implementation; tests substitute a recording mock.
//!
//! Handles that the core copies around freely (command buffers, descriptor
//! sets, descriptor infos) are `Copy`. Objects with a destruction step
//! (chains, layouts, pools, buffers, pipelines) are owned values that release
//! their resources on drop.

use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;

use ash::vk;

use crate::buffer::BufferUsage;
use crate::error::RhiResult;

/// Outcome of acquiring the next presentable image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquiredImage {
    /// Image acquired, chain matches the surface.
    Ready(u32),
    /// Image acquired, but the chain no longer matches the surface exactly.
    Suboptimal(u32),
    /// No image; the chain must be rebuilt before rendering.
    OutOfDate,
}

/// Outcome of submitting a frame and presenting its image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStatus {
    Success,
    Suboptimal,
    OutOfDate,
}

impl ChainStatus {
    /// Whether the chain should be rebuilt after this present.
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, ChainStatus::Success)
    }
}

/// Kind of resource a descriptor slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorKind {
    UniformBuffer,
    UniformBufferDynamic,
    StorageBuffer,
    StorageBufferDynamic,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
}

impl DescriptorKind {
    /// Converts to the Vulkan descriptor type.
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            DescriptorKind::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        }
    }

    /// Whether this kind is backed by an image rather than a buffer.
    #[inline]
    pub fn is_image(self) -> bool {
        matches!(
            self,
            DescriptorKind::CombinedImageSampler
                | DescriptorKind::SampledImage
                | DescriptorKind::StorageImage
        )
    }
}

/// One slot of a descriptor set layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: vk::ShaderStageFlags,
    pub count: u32,
}

/// Budget entry of a descriptor pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSize {
    pub kind: DescriptorKind,
    pub count: u32,
}

/// Resource referenced by a descriptor write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorResource<B, I> {
    Buffer(B),
    Image(I),
}

/// One committed write into a descriptor set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorWrite<B, I> {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub resource: DescriptorResource<B, I>,
}

/// Description of the single graphics pipeline used for entity drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsPipelineDesc {
    /// Path to the compiled vertex shader.
    pub vertex_shader: PathBuf,
    /// Path to the compiled fragment shader.
    pub fragment_shader: PathBuf,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
}

impl GraphicsPipelineDesc {
    /// Creates a description with back-face culling off and depth testing on.
    pub fn new(vertex_shader: impl Into<PathBuf>, fragment_shader: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
        }
    }
}

/// The rotating set of presentable images for one output surface.
///
/// A chain owns its images, depth target and the synchronization objects
/// that guard them. `acquire_next_image` waits until the work previously
/// submitted for `frame_slot` has retired, so the caller may reuse that
/// slot's command buffer once it returns an image.
pub trait PresentationChain {
    type CommandBuffer: Copy;

    /// Number of presentable images.
    fn image_count(&self) -> usize;

    /// Current image extent.
    fn extent(&self) -> vk::Extent2D;

    /// Whether pipelines built against `other` can render into `self`.
    fn is_compatible_with(&self, other: &Self) -> bool;

    /// Requests the next image for the given frame slot.
    ///
    /// # Errors
    ///
    /// Any status other than ready, suboptimal or out of date is fatal.
    fn acquire_next_image(&mut self, frame_slot: usize) -> RhiResult<AcquiredImage>;

    /// Submits `cmd` for `image_index`, then queues the image for presentation.
    ///
    /// # Errors
    ///
    /// Device-level failures (lost device, out of memory) are fatal.
    fn submit_and_present(
        &mut self,
        cmd: Self::CommandBuffer,
        image_index: u32,
        frame_slot: usize,
    ) -> RhiResult<ChainStatus>;

    /// Records the start of rendering into `image_index` with the given clear color.
    fn begin_rendering(&self, cmd: Self::CommandBuffer, image_index: u32, clear_color: [f32; 4]);

    /// Records the end of rendering and the transition to presentable layout.
    fn end_rendering(&self, cmd: Self::CommandBuffer, image_index: u32);
}

/// Device-level operations required by the frame orchestrator, the
/// descriptor allocator and the draw submission layer.
pub trait GraphicsBackend: Send + Sync + 'static {
    type CommandBuffer: Copy + Eq + fmt::Debug;
    type Chain: PresentationChain<CommandBuffer = Self::CommandBuffer>;
    type SetLayout;
    type DescriptorPool;
    type DescriptorSet: Copy + Eq + Hash + fmt::Debug;
    type BufferInfo: Copy + fmt::Debug;
    type ImageInfo: Copy + fmt::Debug;
    type Buffer;
    type PipelineLayout;
    type Pipeline;

    // Device

    /// Blocks until the device has no outstanding work.
    fn wait_idle(&self) -> RhiResult<()>;

    /// Device limit on the total push-constant block size, in bytes.
    fn max_push_constants_size(&self) -> u32;

    /// Creates a presentation chain, reusing platform resources from `previous` when given.
    fn create_chain(
        &self,
        extent: vk::Extent2D,
        frames_in_flight: usize,
        previous: Option<&Self::Chain>,
    ) -> RhiResult<Self::Chain>;

    // Command recording

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<Self::CommandBuffer>>;
    fn free_command_buffers(&self, buffers: &[Self::CommandBuffer]);
    fn begin_command_buffer(&self, cmd: Self::CommandBuffer) -> RhiResult<()>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> RhiResult<()>;
    fn cmd_set_viewport_and_scissor(&self, cmd: Self::CommandBuffer, extent: vk::Extent2D);

    // Descriptors

    fn create_set_layout(&self, bindings: &[LayoutBinding]) -> RhiResult<Self::SetLayout>;
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[PoolSize],
    ) -> RhiResult<Self::DescriptorPool>;

    /// Allocates one set. `Ok(None)` means the pool has no room left.
    fn allocate_descriptor_set(
        &self,
        pool: &Self::DescriptorPool,
        layout: &Self::SetLayout,
    ) -> RhiResult<Option<Self::DescriptorSet>>;

    fn free_descriptor_sets(
        &self,
        pool: &Self::DescriptorPool,
        sets: &[Self::DescriptorSet],
    ) -> RhiResult<()>;
    fn reset_descriptor_pool(&self, pool: &Self::DescriptorPool) -> RhiResult<()>;
    fn update_descriptor_set(
        &self,
        set: Self::DescriptorSet,
        writes: &[DescriptorWrite<Self::BufferInfo, Self::ImageInfo>],
    );

    // Buffers

    /// Creates a host-visible buffer of `size` bytes.
    fn create_buffer(&self, usage: BufferUsage, size: u64) -> RhiResult<Self::Buffer>;
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> RhiResult<()>;
    /// Descriptor info covering the whole buffer.
    fn buffer_info(&self, buffer: &Self::Buffer) -> Self::BufferInfo;

    // Pipelines

    fn create_pipeline_layout(
        &self,
        set_layouts: &[&Self::SetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self::PipelineLayout>;
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: &Self::PipelineLayout,
        chain: &Self::Chain,
    ) -> RhiResult<Self::Pipeline>;

    // Draw commands

    fn cmd_bind_pipeline(&self, cmd: Self::CommandBuffer, pipeline: &Self::Pipeline);
    fn cmd_bind_descriptor_set(
        &self,
        cmd: Self::CommandBuffer,
        layout: &Self::PipelineLayout,
        set_index: u32,
        set: Self::DescriptorSet,
    );
    fn cmd_push_constants(
        &self,
        cmd: Self::CommandBuffer,
        layout: &Self::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );
    fn cmd_bind_vertex_buffer(&self, cmd: Self::CommandBuffer, buffer: &Self::Buffer);
    fn cmd_bind_index_buffer(&self, cmd: Self::CommandBuffer, buffer: &Self::Buffer);
    fn cmd_draw(&self, cmd: Self::CommandBuffer, vertex_count: u32);
    fn cmd_draw_indexed(&self, cmd: Self::CommandBuffer, index_count: u32);
}
