//! Window management using winit.
//!
//! The frame loop drives the window instead of handing control to winit:
//! [`Window::poll_events`] and [`Window::wait_events`] pump the event loop
//! through [`EventLoopExtPumpEvents`], so the renderer can block on events
//! while the window is minimized.

use std::ffi::c_char;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use cadence_core::{Error, Result};

/// What the frame orchestrator needs from the output surface.
pub trait SurfaceProvider {
    /// Current drawable size in pixels. Zero while minimized.
    fn extent(&self) -> vk::Extent2D;

    /// Whether the size changed since the flag was last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Whether the user asked to close the surface.
    fn should_close(&self) -> bool;

    /// Blocks until at least one window event arrives, then processes it.
    fn wait_events(&mut self);
}

/// Event handler state shared with winit while pumping.
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Arc<WinitWindow>>,
    create_error: Option<String>,
    resized: bool,
    close_requested: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                tracing::debug!("Window resized: {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::ScaleFactorChanged { .. } => self.resized = true,
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.close_requested = true,
            _ => {}
        }
    }
}

/// An OS window plus the event loop that feeds it.
pub struct Window {
    // The window must go before the event loop.
    inner: Arc<WinitWindow>,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Window {
    /// Opens a resizable window of `width` x `height` pixels.
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;

        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let mut state = WindowState {
            attributes,
            window: None,
            create_error: None,
            resized: false,
            close_requested: false,
        };

        // The window is created from `resumed`, which the first pumps deliver.
        let inner = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let Some(e) = state.create_error.take() {
                return Err(Error::Window(e));
            }
            if let Some(window) = &state.window {
                break window.clone();
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "event loop exited with code {code} before the window opened"
                )));
            }
        };

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            inner,
            state,
            event_loop,
        })
    }

    fn inner(&self) -> &WinitWindow {
        &self.inner
    }

    /// Processes pending events without blocking.
    pub fn poll_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            self.state.close_requested = true;
        }
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// The caller owns the returned handle and must destroy it before `instance`.
    pub fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display_handle = self
            .inner()
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;
        let window_handle = self
            .inner()
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {e}")))?;

        // SAFETY: both handles come from a live winit window, and the caller
        // keeps the instance alive for as long as the surface.
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {e}")))?
        };

        tracing::info!("Vulkan surface created");
        Ok(surface)
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// The pointers reference static strings owned by the Vulkan loader.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .inner()
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| Error::Vulkan(format!("Failed to enumerate required extensions: {e}")))?;

        tracing::debug!(
            "Required Vulkan extensions for surface: {:?}",
            extensions
                .iter()
                // SAFETY: ash_window returns valid, null-terminated static strings.
                .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
                .collect::<Vec<_>>()
        );

        Ok(extensions.to_vec())
    }
}

impl SurfaceProvider for Window {
    fn extent(&self) -> vk::Extent2D {
        let size = self.inner().inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn wait_events(&mut self) {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(None, &mut self.state) {
            self.state.close_requested = true;
        }
    }
}
