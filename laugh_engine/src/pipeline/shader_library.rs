/// Shader modules loaded by name from the shader directory, created once

use rustc_hash::FxHashMap;

use crate::assets::AssetLoader;
use crate::config::RendererConfig;
use crate::device::{GraphicsDevice, ShaderModuleDesc, ShaderModuleHandle, ShaderStage};
use crate::error::{Error, Result};
use crate::engine_trace;

/// Stage of a shader from its name's extension (`lighting.frag`, `brdf_lut.comp`, ...)
pub fn stage_from_name(name: &str) -> Result<ShaderStage> {
    match name.rsplit('.').next() {
        Some("vert") => Ok(ShaderStage::VERTEX),
        Some("geom") => Ok(ShaderStage::GEOMETRY),
        Some("frag") => Ok(ShaderStage::FRAGMENT),
        Some("comp") => Ok(ShaderStage::COMPUTE),
        _ => Err(Error::InvalidResource(format!("cannot tell shader stage of '{}'", name))),
    }
}

pub struct ShaderLibrary {
    modules: FxHashMap<String, (ShaderModuleHandle, ShaderStage)>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self { modules: FxHashMap::default() }
    }

    /// Module for `name`, loading `<shader_dir>/<name>.spv` on first use
    pub fn get_or_load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        loader: &dyn AssetLoader,
        config: &RendererConfig,
        name: &str,
    ) -> Result<(ShaderModuleHandle, ShaderStage)> {
        if let Some(entry) = self.modules.get(name) {
            return Ok(*entry);
        }
        let stage = stage_from_name(name)?;
        let code = loader.load_spirv(&config.shader_path(name))?;
        let module = device.create_shader_module(&ShaderModuleDesc { name: name.to_string(), stage, code })?;
        engine_trace!("laugh::Pipelines", "Loaded shader {}", name);
        self.modules.insert(name.to_string(), (module, stage));
        Ok((module, stage))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, (module, _)) in self.modules.drain() {
            device.destroy_shader_module(module);
        }
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
