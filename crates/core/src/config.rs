//! Runtime configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Renderer and window settings, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial window width in pixels
    pub width: u32,
    /// Initial window height in pixels
    pub height: u32,
    /// Window title
    pub title: String,
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Color the swapchain image is cleared to each frame
    pub clear_color: [f32; 4],
    /// Directory holding compiled SPIR-V shaders
    pub shader_dir: PathBuf,
    /// Optional JSON scene to load instead of the built-in one
    pub scene_file: Option<PathBuf>,
}

impl RendererConfig {
    /// Largest supported `frames_in_flight`.
    pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

    /// Builds a config from `CADENCE_*` environment variables on top of the defaults.
    ///
    /// Recognized variables: `CADENCE_WIDTH`, `CADENCE_HEIGHT`, `CADENCE_TITLE`,
    /// `CADENCE_FRAMES_IN_FLIGHT`, `CADENCE_VALIDATION`, `CADENCE_SHADER_DIR` and
    /// `CADENCE_SCENE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(width) = parse_var(&lookup, "CADENCE_WIDTH")? {
            config.width = width;
        }
        if let Some(height) = parse_var(&lookup, "CADENCE_HEIGHT")? {
            config.height = height;
        }
        if let Some(title) = lookup("CADENCE_TITLE") {
            config.title = title;
        }
        if let Some(frames) = parse_var(&lookup, "CADENCE_FRAMES_IN_FLIGHT")? {
            config.frames_in_flight = frames;
        }
        if let Some(validation) = parse_var(&lookup, "CADENCE_VALIDATION")? {
            config.enable_validation = validation;
        }
        if let Some(dir) = lookup("CADENCE_SHADER_DIR") {
            config.shader_dir = PathBuf::from(dir);
        }
        if let Some(scene) = lookup("CADENCE_SCENE").filter(|s| !s.trim().is_empty()) {
            config.scene_file = Some(PathBuf::from(scene));
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings describe a usable renderer.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=Self::MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be in 1..={}, got {}",
                Self::MAX_FRAMES_IN_FLIGHT,
                self.frames_in_flight
            )));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Cadence".to_string(),
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.01, 0.01, 0.01, 1.0],
            shader_dir: PathBuf::from("shaders/spirv"),
            scene_file: None,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
