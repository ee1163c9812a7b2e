//! Platform abstraction layer.
//!
//! Owns the OS window and its event loop, creates the Vulkan surface for it,
//! and exposes the [`SurfaceProvider`] seam the frame orchestrator waits on.

mod window;

pub use window::{SurfaceProvider, Window};
