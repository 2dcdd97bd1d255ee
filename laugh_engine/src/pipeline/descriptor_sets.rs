/// Descriptor sets of the fixed passes
///
/// One set per logical consumer. Precompute sets exist until precomputation is
/// done; the lighting and final sets embed the precomputed maps and are only
/// created once those are readable. Sets referencing attachments are rewritten
/// after a resize (the device is idle by then).

use rustc_hash::FxHashMap;

use crate::device::*;
use crate::error::{Error, Result};
use crate::pipeline::descriptor_layouts::{bindings, SetLayoutKind};
use crate::pipeline::pipeline_builder::Pipelines;
use crate::registry::{AttachmentSlot, ImageId, PrecomputedSlot, ResourceRegistry};
use crate::uniform_blob::SharedUniforms;
use crate::engine_debug;

/// The descriptor sets owned by the renderer (per-model sets live on the models)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetRole {
    BrdfLut,
    Prefilter,
    Skybox,
    Lighting,
    /// Bloom input: lighting result (brightness mask)
    BloomFromLighting,
    /// Bloom input: post-effect 0 (horizontal blur, merge)
    BloomFromPost0,
    /// Bloom input: post-effect 1 (vertical blur)
    BloomFromPost1,
    Final,
}

impl SetRole {
    pub fn layout(&self) -> SetLayoutKind {
        match self {
            SetRole::BrdfLut => SetLayoutKind::BrdfLut,
            SetRole::Prefilter => SetLayoutKind::Prefilter,
            SetRole::Skybox => SetLayoutKind::Skybox,
            SetRole::Lighting => SetLayoutKind::Lighting,
            SetRole::BloomFromLighting | SetRole::BloomFromPost0 | SetRole::BloomFromPost1 => SetLayoutKind::Bloom,
            SetRole::Final => SetLayoutKind::Final,
        }
    }

    /// Whether the set references resolution-dependent attachments
    pub fn references_attachments(&self) -> bool {
        matches!(
            self,
            SetRole::Lighting
                | SetRole::BloomFromLighting
                | SetRole::BloomFromPost0
                | SetRole::BloomFromPost1
                | SetRole::Final
        )
    }
}

/// Inputs shared by every set
pub struct SetSources<'a> {
    pub registry: &'a ResourceRegistry,
    /// Device buffer mirroring the uniform blob
    pub uniform_buffer: BufferHandle,
    pub uniforms: &'a SharedUniforms,
    /// Unfiltered environment cube map
    pub radiance: ImageId,
}

pub struct DescriptorSets {
    sets: FxHashMap<SetRole, DescriptorSetHandle>,
}

impl DescriptorSets {
    pub fn new() -> Self {
        Self { sets: FxHashMap::default() }
    }

    /// Sets of the precompute work (BRDF output image, prefilter inputs)
    pub fn create_precompute(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &Pipelines,
        sources: &SetSources,
        compute_brdf: bool,
        prefilter: bool,
    ) -> Result<()> {
        if compute_brdf {
            self.create(device, pipelines, sources, SetRole::BrdfLut)?;
        }
        if prefilter {
            self.create(device, pipelines, sources, SetRole::Prefilter)?;
        }
        Ok(())
    }

    pub fn destroy_precompute(&mut self, device: &mut dyn GraphicsDevice) {
        for role in [SetRole::BrdfLut, SetRole::Prefilter] {
            if let Some(set) = self.sets.remove(&role) {
                device.free_descriptor_set(set);
            }
        }
    }

    /// Sets of the per-frame passes
    ///
    /// The precomputed maps must already be in `ShaderReadOnly`.
    pub fn create_steady(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &Pipelines,
        sources: &SetSources,
    ) -> Result<()> {
        for slot in PrecomputedSlot::ALL {
            let image = sources.registry.precomputed(slot)?;
            if image.layout != ImageLayout::ShaderReadOnly {
                return Err(Error::InvalidResource(format!(
                    "{} is still in {:?}, steady descriptor sets need it readable",
                    image.name, image.layout
                )));
            }
        }
        for role in [
            SetRole::Skybox,
            SetRole::Lighting,
            SetRole::BloomFromLighting,
            SetRole::BloomFromPost0,
            SetRole::BloomFromPost1,
            SetRole::Final,
        ] {
            self.create(device, pipelines, sources, role)?;
        }
        engine_debug!("laugh::Pipelines", "Created steady descriptor sets");
        Ok(())
    }

    /// Point every attachment-referencing set at the recreated views
    pub fn rewrite_attachments(&mut self, device: &mut dyn GraphicsDevice, sources: &SetSources) -> Result<()> {
        let roles: Vec<SetRole> = self.sets.keys().copied().filter(|role| role.references_attachments()).collect();
        for role in roles {
            let writes = Self::writes(role, sources)?;
            device.update_descriptor_set(self.sets[&role], &writes)?;
        }
        Ok(())
    }

    fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &Pipelines,
        sources: &SetSources,
        role: SetRole,
    ) -> Result<()> {
        let writes = Self::writes(role, sources)?;
        let set = match self.sets.get(&role) {
            Some(set) => *set,
            None => {
                let set = device.allocate_descriptor_set(pipelines.set_layout(role.layout())?)?;
                self.sets.insert(role, set);
                set
            }
        };
        device.update_descriptor_set(set, &writes)
    }

    fn writes(role: SetRole, sources: &SetSources) -> Result<Vec<DescriptorWrite>> {
        use bindings::*;

        let registry = sources.registry;
        let buffer = sources.uniform_buffer;
        let readable = ImageLayout::ShaderReadOnly;
        let attachment = |slot: AttachmentSlot, layout: ImageLayout| -> Result<DescriptorResource> {
            registry.attachment(slot)?.sampled(layout)
        };
        let input = |slot: AttachmentSlot, layout: ImageLayout| -> Result<DescriptorResource> {
            let view = registry.attachment(slot)?.default_view();
            Ok(DescriptorResource::InputAttachment { view, layout })
        };
        let precomputed = |slot: PrecomputedSlot| registry.precomputed(slot)?.sampled(readable);
        let radiance = || registry.image(sources.radiance)?.sampled(readable);
        let w = DescriptorWrite::new;

        let writes = match role {
            SetRole::BrdfLut => {
                let view = registry.precomputed(PrecomputedSlot::BrdfLut)?.default_view();
                vec![w(BRDF_OUTPUT, DescriptorResource::StorageImage { view, layout: ImageLayout::General })]
            }
            SetRole::Prefilter => vec![
                w(PREFILTER_CUBE_VIEWS, sources.uniforms.cube_views.descriptor(buffer)),
                w(PREFILTER_RADIANCE, radiance()?),
            ],
            SetRole::Skybox => vec![
                w(SKYBOX_TRANSFORMS, sources.uniforms.transforms.descriptor(buffer)),
                w(SKYBOX_RADIANCE, radiance()?),
            ],
            SetRole::Lighting => vec![
                w(LIGHTING_PARAMS, sources.uniforms.lighting.descriptor(buffer)),
                w(LIGHTING_DEPTH, input(AttachmentSlot::Depth, ImageLayout::DepthStencilReadOnly)?),
                w(LIGHTING_GBUFFER1, input(AttachmentSlot::GBuffer1, readable)?),
                w(LIGHTING_GBUFFER2, input(AttachmentSlot::GBuffer2, readable)?),
                w(LIGHTING_GBUFFER3, input(AttachmentSlot::GBuffer3, readable)?),
                w(LIGHTING_DIFFUSE_IRRADIANCE, precomputed(PrecomputedSlot::DiffuseIrradiance)?),
                w(LIGHTING_SPECULAR_IRRADIANCE, precomputed(PrecomputedSlot::SpecularIrradiance)?),
                w(LIGHTING_BRDF_LUT, precomputed(PrecomputedSlot::BrdfLut)?),
            ],
            SetRole::BloomFromLighting => vec![w(BLOOM_INPUT, attachment(AttachmentSlot::LightingResult, readable)?)],
            SetRole::BloomFromPost0 => vec![w(BLOOM_INPUT, attachment(AttachmentSlot::PostEffect0, readable)?)],
            SetRole::BloomFromPost1 => vec![w(BLOOM_INPUT, attachment(AttachmentSlot::PostEffect1, readable)?)],
            SetRole::Final => vec![
                w(FINAL_DISPLAY_INFO, sources.uniforms.display.descriptor(buffer)),
                w(FINAL_LIGHTING, attachment(AttachmentSlot::LightingResult, readable)?),
                w(FINAL_GBUFFER1, attachment(AttachmentSlot::GBuffer1, readable)?),
                w(FINAL_GBUFFER2, attachment(AttachmentSlot::GBuffer2, readable)?),
                w(FINAL_GBUFFER3, attachment(AttachmentSlot::GBuffer3, readable)?),
                w(FINAL_DEPTH, attachment(AttachmentSlot::Depth, ImageLayout::DepthStencilReadOnly)?),
            ],
        };
        Ok(writes)
    }

    pub fn get(&self, role: SetRole) -> Result<DescriptorSetHandle> {
        self.sets
            .get(&role)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("descriptor set {:?} not created", role)))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, set) in self.sets.drain() {
            device.free_descriptor_set(set);
        }
    }
}

impl Default for DescriptorSets {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "descriptor_sets_tests.rs"]
mod tests;
