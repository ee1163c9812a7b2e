//! Vulkan implementation of the backend seam.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::backend::{
    DescriptorWrite, GraphicsBackend, GraphicsPipelineDesc, LayoutBinding, PoolSize,
};
use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandPool;
use crate::descriptor::{self, DescriptorPool, DescriptorSetLayout};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::select_physical_device;
use crate::pipeline::{Pipeline, PipelineLayout};
use crate::surface::Surface;
use crate::swapchain::VulkanChain;

/// Owns the instance, surface, device and the graphics command pool.
///
/// Objects created through the backend hold their own `Arc<Device>` and must
/// be dropped before the backend, since the surface and instance go with it.
pub struct VulkanBackend {
    // Field order is destruction order.
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl VulkanBackend {
    /// Brings up Vulkan for one window.
    ///
    /// `create_surface` is called once the instance exists and must return a
    /// surface created from it.
    pub fn new<F, E>(
        app_name: &CStr,
        enable_validation: bool,
        surface_extensions: &[*const c_char],
        create_surface: F,
    ) -> RhiResult<Self>
    where
        F: FnOnce(&ash::Entry, &ash::Instance) -> Result<vk::SurfaceKHR, E>,
        E: std::fmt::Display,
    {
        let instance = Instance::new(app_name, enable_validation, surface_extensions)?;
        let surface_handle = create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let surface = Surface::from_raw(&instance, surface_handle);

        let physical =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical)?;
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;

        info!(
            "Vulkan backend ready (max push constants: {} bytes)",
            device.max_push_constants_size()
        );

        Ok(Self {
            command_pool,
            device,
            surface,
            instance,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl GraphicsBackend for VulkanBackend {
    type CommandBuffer = vk::CommandBuffer;
    type Chain = VulkanChain;
    type SetLayout = DescriptorSetLayout;
    type DescriptorPool = DescriptorPool;
    type DescriptorSet = vk::DescriptorSet;
    type BufferInfo = vk::DescriptorBufferInfo;
    type ImageInfo = vk::DescriptorImageInfo;
    type Buffer = Buffer;
    type PipelineLayout = PipelineLayout;
    type Pipeline = Pipeline;

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn max_push_constants_size(&self) -> u32 {
        self.device.max_push_constants_size()
    }

    fn create_chain(
        &self,
        extent: vk::Extent2D,
        frames_in_flight: usize,
        previous: Option<&VulkanChain>,
    ) -> RhiResult<VulkanChain> {
        VulkanChain::new(
            &self.instance,
            self.device.clone(),
            &self.surface,
            extent,
            frames_in_flight,
            previous,
        )
    }

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<vk::CommandBuffer>> {
        self.command_pool.allocate(count as u32)
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        self.command_pool.free(buffers);
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()> {
        self.command_pool.begin(cmd)
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()> {
        self.command_pool.end(cmd)
    }

    fn cmd_set_viewport_and_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device.handle().cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.handle().cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn create_set_layout(&self, bindings: &[LayoutBinding]) -> RhiResult<DescriptorSetLayout> {
        DescriptorSetLayout::new(self.device.clone(), bindings)
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[PoolSize],
    ) -> RhiResult<DescriptorPool> {
        DescriptorPool::new(self.device.clone(), max_sets, sizes)
    }

    fn allocate_descriptor_set(
        &self,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
    ) -> RhiResult<Option<vk::DescriptorSet>> {
        pool.allocate(layout.handle())
    }

    fn free_descriptor_sets(
        &self,
        pool: &DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> RhiResult<()> {
        pool.free(sets)
    }

    fn reset_descriptor_pool(&self, pool: &DescriptorPool) -> RhiResult<()> {
        pool.reset()
    }

    fn update_descriptor_set(
        &self,
        set: vk::DescriptorSet,
        writes: &[DescriptorWrite<vk::DescriptorBufferInfo, vk::DescriptorImageInfo>],
    ) {
        descriptor::update_descriptor_set(&self.device, set, writes);
    }

    fn create_buffer(&self, usage: BufferUsage, size: u64) -> RhiResult<Buffer> {
        Buffer::new(self.device.clone(), usage, size)
    }

    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> RhiResult<()> {
        buffer.write(offset, data)
    }

    fn buffer_info(&self, buffer: &Buffer) -> vk::DescriptorBufferInfo {
        descriptor::buffer_info(buffer.handle())
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[&DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<PipelineLayout> {
        let handles: Vec<vk::DescriptorSetLayout> =
            set_layouts.iter().map(|layout| layout.handle()).collect();
        PipelineLayout::new(self.device.clone(), &handles, push_constant_ranges)
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: &PipelineLayout,
        chain: &VulkanChain,
    ) -> RhiResult<Pipeline> {
        Pipeline::new_graphics(
            self.device.clone(),
            desc,
            layout,
            chain.format(),
            chain.depth_format(),
        )
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: &Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.handle(),
            );
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: &PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout.handle(),
                set_index,
                &[set],
                &[],
            );
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: &PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .handle()
                .cmd_push_constants(cmd, layout.handle(), stages, offset, data);
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: &Buffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(cmd, 0, &[buffer.handle()], &[0]);
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: &Buffer) {
        unsafe {
            self.device.handle().cmd_bind_index_buffer(
                cmd,
                buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32) {
        unsafe {
            self.device.handle().cmd_draw(cmd, vertex_count, 1, 0, 0);
        }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
        }
    }
}
