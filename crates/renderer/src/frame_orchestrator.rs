//! Per-frame state machine.
//!
//! [`FrameOrchestrator`] owns the presentation chain and one command buffer
//! per chain image, and drives each tick through
//! acquire → record → submit → present:
//!
//! ```text
//!            begin_frame() ──► Some(cmd)
//!   Idle ────────────────────────────────► FrameStarted
//!    ▲                                          │
//!    └──────────────── end_frame() ◄────────────┘
//! ```
//!
//! Out-of-date and suboptimal chains, resizes and minimization are handled
//! here by rebuilding the chain and dropping the tick. Every other failure
//! is returned as an error. Calls made in the wrong state panic.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use cadence_core::RendererConfig;
//! # use cadence_platform::SurfaceProvider;
//! # use cadence_renderer::FrameOrchestrator;
//! # use cadence_rhi::{GraphicsBackend, RhiResult};
//! # fn run<B: GraphicsBackend>(
//! #     backend: Arc<B>,
//! #     window: &mut impl SurfaceProvider,
//! # ) -> RhiResult<()> {
//! let mut frames = FrameOrchestrator::new(backend, window, &RendererConfig::default())?;
//!
//! if let Some(cmd) = frames.begin_frame(window)? {
//!     frames.begin_render_pass(cmd);
//!     // record draws into `cmd`
//!     frames.end_render_pass(cmd);
//!     frames.end_frame(window)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use cadence_core::RendererConfig;
use cadence_platform::SurfaceProvider;
use cadence_rhi::{AcquiredImage, GraphicsBackend, PresentationChain, RhiError, RhiResult};

/// Drives acquire, record, submit and present for one surface.
pub struct FrameOrchestrator<B: GraphicsBackend> {
    // Dropped before `backend`.
    chain: B::Chain,
    command_buffers: Vec<B::CommandBuffer>,
    backend: Arc<B>,
    frames_in_flight: usize,
    clear_color: [f32; 4],
    /// Frame slot, cycles through `0..frames_in_flight`.
    current_frame: usize,
    /// Chain image acquired for the frame in progress.
    current_image: u32,
    is_frame_started: bool,
}

impl<B: GraphicsBackend> FrameOrchestrator<B> {
    /// Creates the first chain and its command buffers.
    ///
    /// Blocks while `surface` has a zero extent.
    ///
    /// # Errors
    ///
    /// Fails if chain or command buffer creation fails, if the chain has
    /// fewer images than `config.frames_in_flight`, or if the surface is
    /// closed before it ever has a drawable extent.
    ///
    /// # Panics
    ///
    /// Panics if `config.frames_in_flight` is zero.
    pub fn new<S: SurfaceProvider>(
        backend: Arc<B>,
        surface: &mut S,
        config: &RendererConfig,
    ) -> RhiResult<Self> {
        assert!(
            config.frames_in_flight >= 1,
            "frames_in_flight must be at least 1"
        );

        let extent = wait_for_extent(surface).ok_or_else(|| {
            RhiError::SwapchainError("surface closed before it had a drawable extent".to_string())
        })?;
        let chain = backend.create_chain(extent, config.frames_in_flight, None)?;
        check_image_count(&chain, config.frames_in_flight)?;
        let command_buffers = backend.allocate_command_buffers(chain.image_count())?;

        info!(
            "Frame orchestrator ready: {}x{}, {} images, {} frame(s) in flight",
            extent.width,
            extent.height,
            chain.image_count(),
            config.frames_in_flight
        );

        Ok(Self {
            chain,
            command_buffers,
            backend,
            frames_in_flight: config.frames_in_flight,
            clear_color: config.clear_color,
            current_frame: 0,
            current_image: 0,
            is_frame_started: false,
        })
    }

    /// Acquires the next image and opens recording on the current slot's
    /// command buffer.
    ///
    /// Returns `Ok(None)` when the chain was out of date; it has been rebuilt
    /// and the caller should skip this tick.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame<S: SurfaceProvider>(
        &mut self,
        surface: &mut S,
    ) -> RhiResult<Option<B::CommandBuffer>> {
        assert!(
            !self.is_frame_started,
            "begin_frame called while a frame is already in progress"
        );

        let image_index = match self.chain.acquire_next_image(self.current_frame)? {
            AcquiredImage::Ready(index) => index,
            AcquiredImage::Suboptimal(index) => {
                debug!("Acquired image {} from a suboptimal chain", index);
                index
            }
            AcquiredImage::OutOfDate => {
                debug!("Chain out of date on acquire, skipping frame");
                self.rebuild(surface)?;
                return Ok(None);
            }
        };

        let cmd = self.command_buffers[self.current_frame];
        self.backend.begin_command_buffer(cmd)?;

        self.current_image = image_index;
        self.is_frame_started = true;
        Ok(Some(cmd))
    }

    /// Closes recording, submits, presents and advances the frame slot.
    ///
    /// Rebuilds the chain when presentation reports it out of date or
    /// suboptimal, or when the surface was resized during the frame.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn end_frame<S: SurfaceProvider>(&mut self, surface: &mut S) -> RhiResult<()> {
        assert!(
            self.is_frame_started,
            "end_frame called while no frame is in progress"
        );

        let cmd = self.command_buffers[self.current_frame];
        self.backend.end_command_buffer(cmd)?;

        let status = self
            .chain
            .submit_and_present(cmd, self.current_image, self.current_frame);

        self.is_frame_started = false;
        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;

        let status = status?;
        if status.needs_rebuild() || surface.was_resized() {
            debug!(
                "Rebuilding chain after present (status {:?}, resized {})",
                status,
                surface.was_resized()
            );
            self.rebuild(surface)?;
        }

        Ok(())
    }

    /// Starts rendering into the acquired image and sets a full-extent
    /// viewport and scissor.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `cmd` is not the open command buffer.
    pub fn begin_render_pass(&self, cmd: B::CommandBuffer) {
        self.assert_open_scope(cmd, "begin_render_pass");
        self.chain
            .begin_rendering(cmd, self.current_image, self.clear_color);
        self.backend
            .cmd_set_viewport_and_scissor(cmd, self.chain.extent());
    }

    /// Ends rendering into the acquired image.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `cmd` is not the open command buffer.
    pub fn end_render_pass(&self, cmd: B::CommandBuffer) {
        self.assert_open_scope(cmd, "end_render_pass");
        self.chain.end_rendering(cmd, self.current_image);
    }

    /// Current frame slot.
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.is_frame_started
    }

    /// Command buffer of the frame in progress.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn current_command_buffer(&self) -> B::CommandBuffer {
        assert!(
            self.is_frame_started,
            "no command buffer is open while no frame is in progress"
        );
        self.command_buffers[self.current_frame]
    }

    #[inline]
    pub fn chain(&self) -> &B::Chain {
        &self.chain
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.chain.extent()
    }

    /// Width over height of the current chain.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.chain.extent();
        extent.width as f32 / extent.height as f32
    }

    #[inline]
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    fn assert_open_scope(&self, cmd: B::CommandBuffer, operation: &str) {
        assert!(
            self.is_frame_started,
            "{operation} called while no frame is in progress"
        );
        assert_eq!(
            cmd, self.command_buffers[self.current_frame],
            "{operation} called with a command buffer from a different frame"
        );
    }

    /// Replaces the chain with one matching the surface's current extent.
    ///
    /// Consumes the surface's resize flag. Does nothing else if the surface
    /// is closed while waiting for an extent.
    fn rebuild<S: SurfaceProvider>(&mut self, surface: &mut S) -> RhiResult<()> {
        surface.reset_resized_flag();
        let Some(extent) = wait_for_extent(surface) else {
            debug!("Surface closed while minimized, skipping chain rebuild");
            return Ok(());
        };
        self.backend.wait_idle()?;

        let chain = self
            .backend
            .create_chain(extent, self.frames_in_flight, Some(&self.chain))?;
        if !chain.is_compatible_with(&self.chain) {
            return Err(RhiError::SwapchainError(
                "swapchain image or depth format changed on rebuild".to_string(),
            ));
        }
        check_image_count(&chain, self.frames_in_flight)?;

        // The old chain only had to live through the compatibility check.
        drop(std::mem::replace(&mut self.chain, chain));

        let image_count = self.chain.image_count();
        if self.command_buffers.len() != image_count {
            debug!(
                "Image count changed ({} -> {}), reallocating command buffers",
                self.command_buffers.len(),
                image_count
            );
            self.backend.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
            self.command_buffers = self.backend.allocate_command_buffers(image_count)?;
        }

        info!(
            "Chain rebuilt: {}x{}, {} images",
            extent.width, extent.height, image_count
        );
        Ok(())
    }
}

impl<B: GraphicsBackend> Drop for FrameOrchestrator<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            tracing::error!("Failed to wait for device idle during drop: {:?}", e);
        }
        self.backend.free_command_buffers(&self.command_buffers);
        debug!("Frame orchestrator destroyed");
    }
}

/// Blocks on surface events until both dimensions are non-zero.
///
/// Returns `None` if the surface is closed first.
fn wait_for_extent<S: SurfaceProvider>(surface: &mut S) -> Option<vk::Extent2D> {
    let mut extent = surface.extent();
    while extent.width == 0 || extent.height == 0 {
        if surface.should_close() {
            return None;
        }
        debug!("Surface has zero extent, waiting for events");
        surface.wait_events();
        extent = surface.extent();
    }
    Some(extent)
}

fn check_image_count<C: PresentationChain>(chain: &C, frames_in_flight: usize) -> RhiResult<()> {
    if chain.image_count() < frames_in_flight {
        return Err(RhiError::SwapchainError(format!(
            "chain has {} images but {} frames are in flight",
            chain.image_count(),
            frames_in_flight
        )));
    }
    Ok(())
}
