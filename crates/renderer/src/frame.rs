//! Per-frame data handed to render systems.

use cadence_rhi::GraphicsBackend;
use cadence_scene::Camera;

/// Everything a render system needs to record one frame.
///
/// Built after [`FrameOrchestrator::begin_frame`](crate::FrameOrchestrator::begin_frame)
/// returns a command buffer and dropped before `end_frame`. The borrow of
/// the camera keeps it from outliving the tick.
pub struct FrameContext<'a, B: GraphicsBackend> {
    /// Frame slot, in `0..frames_in_flight`.
    pub frame_index: usize,
    /// Seconds since the previous frame.
    pub frame_time: f32,
    pub command_buffer: B::CommandBuffer,
    pub camera: &'a Camera,
    /// Global uniform set of this slot.
    pub global_set: B::DescriptorSet,
}
