//! Core utilities shared across the cadence crates.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Runtime configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::RendererConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{FrameTimer, MAX_FRAME_DELTA};
