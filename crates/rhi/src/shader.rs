//! SPIR-V shader modules.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Entry point used by every shader in this renderer.
const ENTRY_POINT: &std::ffi::CStr = c"main";

/// A shader module bound to one pipeline stage.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl Shader {
    /// Loads a compiled SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ShaderError`] if the file cannot be read or is not
    /// valid SPIR-V, or a Vulkan error if module creation fails.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: vk::ShaderStageFlags,
    ) -> RhiResult<Self> {
        debug!("Loading {:?} shader from {:?}", stage, path);
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("failed to read shader file {path:?}: {e}"))
        })?;
        Self::from_spirv_bytes(device, &bytes, stage)
    }

    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: vk::ShaderStageFlags,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        Ok(Self {
            device,
            module,
            stage,
        })
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage)
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_shader_module(self.module, None);
        }
    }
}

/// Reinterprets SPIR-V bytes as little-endian words and checks the magic number.
fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    const SPIRV_MAGIC: u32 = 0x0723_0203;

    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(RhiError::ShaderError(format!(
            "invalid SPIR-V magic number {:#010x}",
            words[0]
        )));
    }

    Ok(words)
}
