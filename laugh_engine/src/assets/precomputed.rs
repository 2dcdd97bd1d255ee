/// Load-or-compute decision for the precomputed maps, and saving them afterwards

use crate::assets::AssetLoader;
use crate::config::RendererConfig;
use crate::device::{GraphicsDevice, ImageLayout};
use crate::error::Result;
use crate::registry::{PrecomputedSlot, ResourceRegistry};
use crate::{engine_info, engine_warn};

/// Which precomputed maps have to be produced on the GPU this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecomputePlan {
    pub compute_brdf: bool,
    pub compute_diffuse: bool,
    pub compute_specular: bool,
}

impl PrecomputePlan {
    pub fn computes(&self, slot: PrecomputedSlot) -> bool {
        match slot {
            PrecomputedSlot::BrdfLut => self.compute_brdf,
            PrecomputedSlot::DiffuseIrradiance => self.compute_diffuse,
            PrecomputedSlot::SpecularIrradiance => self.compute_specular,
        }
    }

    /// Whether the environment prefilter pass has anything to do
    pub fn needs_prefilter(&self) -> bool {
        self.compute_diffuse || self.compute_specular
    }

    pub fn is_empty(&self) -> bool {
        !self.compute_brdf && !self.needs_prefilter()
    }

    pub fn computed_slots(&self) -> Vec<PrecomputedSlot> {
        PrecomputedSlot::ALL.into_iter().filter(|slot| self.computes(*slot)).collect()
    }
}

/// Create every precomputed map: loaded from disk where a file exists,
/// allocated empty (to be computed) otherwise
pub fn prepare_precomputed(
    device: &mut dyn GraphicsDevice,
    registry: &mut ResourceRegistry,
    loader: &dyn AssetLoader,
    config: &RendererConfig,
) -> Result<PrecomputePlan> {
    let mut plan = PrecomputePlan::default();
    for slot in PrecomputedSlot::ALL {
        let path = config.asset_path(slot.file_name());
        if loader.exists(&path) {
            let data = loader.load_texture(&path)?;
            registry.load_precomputed(device, slot, &data)?;
            engine_info!("laugh::Assets", "Loaded {} from {}", slot.name(), path.display());
        } else {
            registry.create_precomputed(device, slot)?;
            match slot {
                PrecomputedSlot::BrdfLut => plan.compute_brdf = true,
                PrecomputedSlot::DiffuseIrradiance => plan.compute_diffuse = true,
                PrecomputedSlot::SpecularIrradiance => plan.compute_specular = true,
            }
            engine_info!("laugh::Assets", "{} not found, will compute it", path.display());
        }
    }
    Ok(plan)
}

/// Read back every computed map and persist it
///
/// The device must be idle. Each image goes through `TransferSrc` for the
/// readback and is returned to `ShaderReadOnly`.
pub fn save_computed(
    device: &mut dyn GraphicsDevice,
    registry: &mut ResourceRegistry,
    loader: &dyn AssetLoader,
    config: &RendererConfig,
    plan: &PrecomputePlan,
) -> Result<()> {
    for slot in plan.computed_slots() {
        let id = registry.precomputed_id(slot)?;
        registry.transition(device, id, ImageLayout::TransferSrc)?;
        let image = registry.image(id)?.image;
        let data = device.read_image(image)?;
        registry.transition(device, id, ImageLayout::ShaderReadOnly)?;

        let path = config.asset_path(slot.file_name());
        if let Err(e) = loader.save_texture(&path, &data) {
            engine_warn!("laugh::Assets", "Could not save {}: {}", path.display(), e);
            return Err(e);
        }
        engine_info!("laugh::Assets", "Saved {} to {}", slot.name(), path.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "precomputed_tests.rs"]
mod tests;
