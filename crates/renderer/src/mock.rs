//! Recording backend for unit tests.
//!
//! Every call that would reach the GPU is appended to a shared command log.
//! Acquire and present outcomes, chain image counts and formats can be
//! scripted ahead of time.

use std::collections::VecDeque;
use std::iter;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;

use cadence_platform::SurfaceProvider;
use cadence_rhi::pipeline::check_push_constant_ranges;
use cadence_rhi::{
    AcquiredImage, BufferUsage, ChainStatus, DescriptorWrite, GraphicsBackend,
    GraphicsPipelineDesc, LayoutBinding, PoolSize, PresentationChain, RhiError, RhiResult,
};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCommand {
    Acquire {
        frame_slot: usize,
    },
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    BeginRendering {
        cmd: u64,
        image_index: u32,
    },
    EndRendering {
        cmd: u64,
        image_index: u32,
    },
    SetViewportAndScissor(vk::Extent2D),
    SubmitAndPresent {
        cmd: u64,
        image_index: u32,
        frame_slot: usize,
    },
    UpdateDescriptorSet {
        set: u64,
        writes: Vec<DescriptorWrite<u64, u64>>,
    },
    FreeDescriptorSets(Vec<u64>),
    ResetDescriptorPool(u64),
    WriteBuffer {
        buffer: u64,
        offset: u64,
        data: Vec<u8>,
    },
    BindPipeline(u64),
    BindDescriptorSet {
        set_index: u32,
        set: u64,
    },
    PushConstants {
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffer(u64),
    BindIndexBuffer(u64),
    Draw(u32),
    DrawIndexed(u32),
}

struct MockState {
    log: Vec<MockCommand>,
    acquire_script: VecDeque<Result<AcquiredImage, vk::Result>>,
    present_script: VecDeque<Result<ChainStatus, vk::Result>>,
    next_image_count: usize,
    next_chain_format: u32,
    last_chain_extent: vk::Extent2D,
    chains_created: usize,
    wait_idle_count: usize,
    next_id: u64,
    first_command_buffer: Option<u64>,
    allocated_command_buffers: usize,
    freed_command_buffers: usize,
    descriptor_pool_full: bool,
    max_push_constants_size: u32,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Backend that records instead of rendering.
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                log: Vec::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                next_image_count: 3,
                next_chain_format: 1,
                last_chain_extent: vk::Extent2D::default(),
                chains_created: 0,
                wait_idle_count: 0,
                next_id: 0,
                first_command_buffer: None,
                allocated_command_buffers: 0,
                freed_command_buffers: 0,
                descriptor_pool_full: false,
                max_push_constants_size: 128,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn log(&self) -> Vec<MockCommand> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    pub fn script_acquire(&self, result: AcquiredImage) {
        self.state().acquire_script.push_back(Ok(result));
    }

    pub fn fail_next_acquire(&self, error: vk::Result) {
        self.state().acquire_script.push_back(Err(error));
    }

    pub fn script_present(&self, status: ChainStatus) {
        self.state().present_script.push_back(Ok(status));
    }

    pub fn fail_next_present(&self, error: vk::Result) {
        self.state().present_script.push_back(Err(error));
    }

    /// Image count of every chain created from now on.
    pub fn set_next_image_count(&self, count: usize) {
        self.state().next_image_count = count;
    }

    /// Color format of every chain created from now on.
    pub fn set_next_chain_format(&self, format: u32) {
        self.state().next_chain_format = format;
    }

    /// Makes the device report every pool as full.
    pub fn set_descriptor_pool_full(&self, full: bool) {
        self.state().descriptor_pool_full = full;
    }

    pub fn set_max_push_constants_size(&self, size: u32) {
        self.state().max_push_constants_size = size;
    }

    pub fn chains_created(&self) -> usize {
        self.state().chains_created
    }

    pub fn last_chain_extent(&self) -> vk::Extent2D {
        self.state().last_chain_extent
    }

    pub fn wait_idle_count(&self) -> usize {
        self.state().wait_idle_count
    }

    pub fn allocated_command_buffers(&self) -> usize {
        self.state().allocated_command_buffers
    }

    pub fn freed_command_buffers(&self) -> usize {
        self.state().freed_command_buffers
    }

    pub fn first_command_buffer(&self) -> u64 {
        self.state()
            .first_command_buffer
            .expect("no command buffer has been allocated")
    }

    fn record(&self, command: MockCommand) {
        self.state().log.push(command);
    }
}

pub struct MockChain {
    state: Arc<Mutex<MockState>>,
    image_count: usize,
    extent: vk::Extent2D,
    format: u32,
    next_image: u32,
}

impl PresentationChain for MockChain {
    type CommandBuffer = u64;

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn is_compatible_with(&self, other: &Self) -> bool {
        self.format == other.format
    }

    fn acquire_next_image(&mut self, frame_slot: usize) -> RhiResult<AcquiredImage> {
        let mut state = self.state.lock().unwrap();
        state.log.push(MockCommand::Acquire { frame_slot });

        match state.acquire_script.pop_front() {
            Some(result) => Ok(result?),
            None => {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count as u32;
                Ok(AcquiredImage::Ready(index))
            }
        }
    }

    fn submit_and_present(
        &mut self,
        cmd: u64,
        image_index: u32,
        frame_slot: usize,
    ) -> RhiResult<ChainStatus> {
        let mut state = self.state.lock().unwrap();
        state.log.push(MockCommand::SubmitAndPresent {
            cmd,
            image_index,
            frame_slot,
        });
        match state.present_script.pop_front() {
            Some(result) => Ok(result?),
            None => Ok(ChainStatus::Success),
        }
    }

    fn begin_rendering(&self, cmd: u64, image_index: u32, _clear_color: [f32; 4]) {
        self.state
            .lock()
            .unwrap()
            .log
            .push(MockCommand::BeginRendering { cmd, image_index });
    }

    fn end_rendering(&self, cmd: u64, image_index: u32) {
        self.state
            .lock()
            .unwrap()
            .log
            .push(MockCommand::EndRendering { cmd, image_index });
    }
}

#[derive(Debug)]
pub struct MockSetLayout {
    pub bindings: Vec<LayoutBinding>,
}

#[derive(Debug)]
pub struct MockPool {
    pub id: u64,
    pub max_sets: u32,
    pub sizes: Vec<PoolSize>,
}

#[derive(Debug)]
pub struct MockBuffer {
    pub id: u64,
    pub usage: BufferUsage,
    pub size: u64,
}

#[derive(Debug)]
pub struct MockPipelineLayout {
    pub set_layouts: usize,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

#[derive(Debug)]
pub struct MockPipeline {
    pub id: u64,
}

impl GraphicsBackend for MockBackend {
    type CommandBuffer = u64;
    type Chain = MockChain;
    type SetLayout = MockSetLayout;
    type DescriptorPool = MockPool;
    type DescriptorSet = u64;
    type BufferInfo = u64;
    type ImageInfo = u64;
    type Buffer = MockBuffer;
    type PipelineLayout = MockPipelineLayout;
    type Pipeline = MockPipeline;

    fn wait_idle(&self) -> RhiResult<()> {
        self.state().wait_idle_count += 1;
        Ok(())
    }

    fn max_push_constants_size(&self) -> u32 {
        self.state().max_push_constants_size
    }

    fn create_chain(
        &self,
        extent: vk::Extent2D,
        _frames_in_flight: usize,
        _previous: Option<&MockChain>,
    ) -> RhiResult<MockChain> {
        let mut state = self.state();
        state.chains_created += 1;
        state.last_chain_extent = extent;
        Ok(MockChain {
            state: self.state.clone(),
            image_count: state.next_image_count,
            extent,
            format: state.next_chain_format,
            next_image: 0,
        })
    }

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<u64>> {
        let mut state = self.state();
        let buffers: Vec<u64> = iter::repeat_with(|| state.next_id()).take(count).collect();
        state.allocated_command_buffers += count;
        if state.first_command_buffer.is_none() {
            state.first_command_buffer = buffers.first().copied();
        }
        Ok(buffers)
    }

    fn free_command_buffers(&self, buffers: &[u64]) {
        self.state().freed_command_buffers += buffers.len();
    }

    fn begin_command_buffer(&self, cmd: u64) -> RhiResult<()> {
        self.record(MockCommand::BeginCommandBuffer(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: u64) -> RhiResult<()> {
        self.record(MockCommand::EndCommandBuffer(cmd));
        Ok(())
    }

    fn cmd_set_viewport_and_scissor(&self, _cmd: u64, extent: vk::Extent2D) {
        self.record(MockCommand::SetViewportAndScissor(extent));
    }

    fn create_set_layout(&self, bindings: &[LayoutBinding]) -> RhiResult<MockSetLayout> {
        Ok(MockSetLayout {
            bindings: bindings.to_vec(),
        })
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[PoolSize]) -> RhiResult<MockPool> {
        Ok(MockPool {
            id: self.state().next_id(),
            max_sets,
            sizes: sizes.to_vec(),
        })
    }

    fn allocate_descriptor_set(
        &self,
        _pool: &MockPool,
        _layout: &MockSetLayout,
    ) -> RhiResult<Option<u64>> {
        let mut state = self.state();
        if state.descriptor_pool_full {
            return Ok(None);
        }
        Ok(Some(state.next_id()))
    }

    fn free_descriptor_sets(&self, _pool: &MockPool, sets: &[u64]) -> RhiResult<()> {
        self.record(MockCommand::FreeDescriptorSets(sets.to_vec()));
        Ok(())
    }

    fn reset_descriptor_pool(&self, pool: &MockPool) -> RhiResult<()> {
        self.record(MockCommand::ResetDescriptorPool(pool.id));
        Ok(())
    }

    fn update_descriptor_set(&self, set: u64, writes: &[DescriptorWrite<u64, u64>]) {
        self.record(MockCommand::UpdateDescriptorSet {
            set,
            writes: writes.to_vec(),
        });
    }

    fn create_buffer(&self, usage: BufferUsage, size: u64) -> RhiResult<MockBuffer> {
        if size == 0 {
            return Err(RhiError::BufferError(
                "buffer size must be greater than 0".to_string(),
            ));
        }
        Ok(MockBuffer {
            id: self.state().next_id(),
            usage,
            size,
        })
    }

    fn write_buffer(&self, buffer: &MockBuffer, offset: u64, data: &[u8]) -> RhiResult<()> {
        if offset + data.len() as u64 > buffer.size {
            return Err(RhiError::BufferError("write exceeds buffer size".to_string()));
        }
        self.record(MockCommand::WriteBuffer {
            buffer: buffer.id,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn buffer_info(&self, buffer: &MockBuffer) -> u64 {
        buffer.id
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[&MockSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<MockPipelineLayout> {
        check_push_constant_ranges(push_constant_ranges, self.max_push_constants_size())?;
        Ok(MockPipelineLayout {
            set_layouts: set_layouts.len(),
            push_constant_ranges: push_constant_ranges.to_vec(),
        })
    }

    fn create_graphics_pipeline(
        &self,
        _desc: &GraphicsPipelineDesc,
        _layout: &MockPipelineLayout,
        _chain: &MockChain,
    ) -> RhiResult<MockPipeline> {
        Ok(MockPipeline {
            id: self.state().next_id(),
        })
    }

    fn cmd_bind_pipeline(&self, _cmd: u64, pipeline: &MockPipeline) {
        self.record(MockCommand::BindPipeline(pipeline.id));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: u64,
        _layout: &MockPipelineLayout,
        set_index: u32,
        set: u64,
    ) {
        self.record(MockCommand::BindDescriptorSet { set_index, set });
    }

    fn cmd_push_constants(
        &self,
        _cmd: u64,
        _layout: &MockPipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.record(MockCommand::PushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: u64, buffer: &MockBuffer) {
        self.record(MockCommand::BindVertexBuffer(buffer.id));
    }

    fn cmd_bind_index_buffer(&self, _cmd: u64, buffer: &MockBuffer) {
        self.record(MockCommand::BindIndexBuffer(buffer.id));
    }

    fn cmd_draw(&self, _cmd: u64, vertex_count: u32) {
        self.record(MockCommand::Draw(vertex_count));
    }

    fn cmd_draw_indexed(&self, _cmd: u64, index_count: u32) {
        self.record(MockCommand::DrawIndexed(index_count));
    }
}

/// Surface whose extent follows a script.
pub struct MockSurface {
    extent: vk::Extent2D,
    pending: VecDeque<vk::Extent2D>,
    resized: bool,
    closed: bool,
    waits: usize,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            pending: VecDeque::new(),
            resized: false,
            closed: false,
            waits: 0,
        }
    }

    /// Changes the extent and raises the resized flag.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }

    /// Reports each of `extents` in turn, advancing on every wait, then `restored`.
    pub fn minimize_until(
        &mut self,
        extents: impl IntoIterator<Item = vk::Extent2D>,
        restored: vk::Extent2D,
    ) {
        self.pending = extents.into_iter().chain(iter::once(restored)).collect();
        if let Some(first) = self.pending.pop_front() {
            self.extent = first;
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn waits(&self) -> usize {
        self.waits
    }
}

impl SurfaceProvider for MockSurface {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn should_close(&self) -> bool {
        self.closed
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if let Some(next) = self.pending.pop_front() {
            self.extent = next;
        }
    }
}
