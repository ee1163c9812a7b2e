//! Pipeline layouts and graphics pipelines.
//!
//! Pipelines use dynamic rendering (no `VkRenderPass`) and dynamic
//! viewport/scissor state, so a chain rebuild that keeps the same formats
//! does not invalidate them.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::backend::GraphicsPipelineDesc;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;
use crate::vertex::Vertex;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a layout from set layouts and push-constant ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if any push-constant range ends
    /// past the device limit; otherwise any Vulkan failure.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        check_push_constant_ranges(push_constant_ranges, device.max_push_constants_size())?;

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} set layout(s) and {} push constant range(s)",
            set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Builds the entity pipeline described by `desc`.
    ///
    /// `color_format` and `depth_format` must match the presentation chain
    /// the pipeline renders into.
    pub fn new_graphics(
        device: Arc<Device>,
        desc: &GraphicsPipelineDesc,
        layout: &PipelineLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &desc.vertex_shader,
            vk::ShaderStageFlags::VERTEX,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &desc.fragment_shader,
            vk::ShaderStageFlags::FRAGMENT,
        )?;
        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| {
                    RhiError::PipelineError(format!("graphics pipeline creation failed: {e}"))
                })?
        };

        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            RhiError::PipelineError("driver returned no graphics pipeline".to_string())
        })?;

        info!(
            "Graphics pipeline created ({:?} + {:?})",
            desc.vertex_shader.file_name().unwrap_or_default(),
            desc.fragment_shader.file_name().unwrap_or_default()
        );

        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Pipeline destroyed");
    }
}

/// Rejects push-constant ranges that do not fit within `limit` bytes.
pub fn check_push_constant_ranges(ranges: &[vk::PushConstantRange], limit: u32) -> RhiResult<()> {
    for range in ranges {
        let end = range.offset.checked_add(range.size);
        if end.is_none_or(|end| end > limit) {
            return Err(RhiError::PipelineError(format!(
                "push constant range {}..+{} exceeds device limit of {} bytes",
                range.offset, range.size, limit
            )));
        }
    }
    Ok(())
}
