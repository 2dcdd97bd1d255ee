/// Scene: the skybox plus every model drawn by the geometry subpass

use std::path::{Path, PathBuf};

use crate::assets::AssetLoader;
use crate::device::{BufferHandle, GraphicsDevice};
use crate::error::Result;
use crate::pipeline::Pipelines;
use crate::registry::ResourceRegistry;
use crate::scene::model::{Model, ModelDesc};
use crate::scene::skybox::Skybox;
use crate::uniform_blob::{SharedUniforms, UniformBlob};

/// What to load
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDesc {
    /// Unfiltered HDR environment cube map (DDS)
    pub radiance_map: PathBuf,
    /// Skybox mesh; a unit cube when `None`
    pub skybox_mesh: Option<PathBuf>,
    pub models: Vec<ModelDesc>,
}

impl SceneDesc {
    /// Scene rooted at `root`: `probes/Unfiltered_HDR.dds`, `models/<name>.obj`,
    /// `textures/<name>/*.dds`
    pub fn from_model_names(root: &Path, names: &[&str]) -> Self {
        let models_dir = root.join("models");
        let textures_dir = root.join("textures");
        Self {
            radiance_map: root.join("probes").join("Unfiltered_HDR.dds"),
            skybox_mesh: None,
            models: names
                .iter()
                .map(|name| ModelDesc::from_name(name, &models_dir, &textures_dir))
                .collect(),
        }
    }
}

pub struct Scene {
    pub skybox: Skybox,
    pub models: Vec<Model>,
}

impl Scene {
    pub fn load(
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        loader: &dyn AssetLoader,
        blob: &mut UniformBlob,
        desc: &SceneDesc,
    ) -> Result<Self> {
        let skybox = Skybox::load(device, registry, loader, desc)?;
        let models = desc
            .models
            .iter()
            .map(|model| Model::load(device, registry, loader, blob, model))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { skybox, models })
    }

    /// One geometry set per model
    pub fn create_descriptor_sets(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &Pipelines,
        registry: &ResourceRegistry,
        uniform_buffer: BufferHandle,
        uniforms: &SharedUniforms,
    ) -> Result<()> {
        for model in &mut self.models {
            model.create_descriptor_set(device, pipelines, registry, uniform_buffer, uniforms.transforms)?;
        }
        Ok(())
    }

    pub fn write_uniforms(&self, blob: &mut UniformBlob) {
        for model in &self.models {
            model.write_uniforms(blob);
        }
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for model in &mut self.models {
            model.destroy(device);
        }
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
