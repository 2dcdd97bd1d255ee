/// Descriptor set layouts of every pipeline
///
/// Binding numbers here are the contract with the GLSL sources; reflection
/// checks each compiled shader against them before any pipeline is built.

use crate::device::{DescriptorBinding, DescriptorSetLayoutDesc, DescriptorType, ShaderStage};

/// The distinct descriptor set layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetLayoutKind {
    BrdfLut,
    /// Shared by diffuse and specular prefiltering
    Prefilter,
    Skybox,
    /// One set per model
    Geometry,
    Lighting,
    /// Shared by brightness, blur and merge
    Bloom,
    Final,
}

impl SetLayoutKind {
    pub const ALL: [SetLayoutKind; 7] = [
        SetLayoutKind::BrdfLut,
        SetLayoutKind::Prefilter,
        SetLayoutKind::Skybox,
        SetLayoutKind::Geometry,
        SetLayoutKind::Lighting,
        SetLayoutKind::Bloom,
        SetLayoutKind::Final,
    ];
}

// ===== BINDING NUMBERS =====

pub mod bindings {
    pub const BRDF_OUTPUT: u32 = 0;

    pub const PREFILTER_CUBE_VIEWS: u32 = 0;
    pub const PREFILTER_RADIANCE: u32 = 1;

    pub const SKYBOX_TRANSFORMS: u32 = 0;
    pub const SKYBOX_RADIANCE: u32 = 1;

    pub const GEOMETRY_TRANSFORMS: u32 = 0;
    pub const GEOMETRY_PER_MODEL: u32 = 1;
    pub const GEOMETRY_ALBEDO: u32 = 2;
    pub const GEOMETRY_NORMAL: u32 = 3;
    pub const GEOMETRY_ROUGHNESS: u32 = 4;
    pub const GEOMETRY_METALNESS: u32 = 5;
    pub const GEOMETRY_AO: u32 = 6;

    pub const LIGHTING_PARAMS: u32 = 0;
    pub const LIGHTING_DEPTH: u32 = 1;
    pub const LIGHTING_GBUFFER1: u32 = 2;
    pub const LIGHTING_GBUFFER2: u32 = 3;
    pub const LIGHTING_GBUFFER3: u32 = 4;
    pub const LIGHTING_DIFFUSE_IRRADIANCE: u32 = 5;
    pub const LIGHTING_SPECULAR_IRRADIANCE: u32 = 6;
    pub const LIGHTING_BRDF_LUT: u32 = 7;

    pub const BLOOM_INPUT: u32 = 0;

    pub const FINAL_DISPLAY_INFO: u32 = 0;
    pub const FINAL_LIGHTING: u32 = 1;
    pub const FINAL_GBUFFER1: u32 = 2;
    pub const FINAL_GBUFFER2: u32 = 3;
    pub const FINAL_GBUFFER3: u32 = 4;
    pub const FINAL_DEPTH: u32 = 5;
}

/// Layout description of one kind
pub fn set_layout_desc(kind: SetLayoutKind) -> DescriptorSetLayoutDesc {
    use bindings::*;
    use DescriptorType::*;

    let fragment = ShaderStage::FRAGMENT;
    let b = DescriptorBinding::new;

    let (name, list) = match kind {
        SetLayoutKind::BrdfLut => ("brdf_lut", vec![b(BRDF_OUTPUT, StorageImage, ShaderStage::COMPUTE)]),
        SetLayoutKind::Prefilter => (
            "prefilter",
            vec![
                b(PREFILTER_CUBE_VIEWS, UniformBuffer, ShaderStage::VERTEX | ShaderStage::GEOMETRY),
                b(PREFILTER_RADIANCE, CombinedImageSampler, fragment),
            ],
        ),
        SetLayoutKind::Skybox => (
            "skybox",
            vec![
                b(SKYBOX_TRANSFORMS, UniformBuffer, ShaderStage::VERTEX),
                b(SKYBOX_RADIANCE, CombinedImageSampler, fragment),
            ],
        ),
        SetLayoutKind::Geometry => (
            "geometry",
            vec![
                b(GEOMETRY_TRANSFORMS, UniformBuffer, ShaderStage::VERTEX),
                b(GEOMETRY_PER_MODEL, UniformBuffer, ShaderStage::VERTEX),
                b(GEOMETRY_ALBEDO, CombinedImageSampler, fragment),
                b(GEOMETRY_NORMAL, CombinedImageSampler, fragment),
                b(GEOMETRY_ROUGHNESS, CombinedImageSampler, fragment),
                b(GEOMETRY_METALNESS, CombinedImageSampler, fragment),
                b(GEOMETRY_AO, CombinedImageSampler, fragment),
            ],
        ),
        SetLayoutKind::Lighting => (
            "lighting",
            vec![
                b(LIGHTING_PARAMS, UniformBuffer, fragment),
                b(LIGHTING_DEPTH, InputAttachment, fragment),
                b(LIGHTING_GBUFFER1, InputAttachment, fragment),
                b(LIGHTING_GBUFFER2, InputAttachment, fragment),
                b(LIGHTING_GBUFFER3, InputAttachment, fragment),
                b(LIGHTING_DIFFUSE_IRRADIANCE, CombinedImageSampler, fragment),
                b(LIGHTING_SPECULAR_IRRADIANCE, CombinedImageSampler, fragment),
                b(LIGHTING_BRDF_LUT, CombinedImageSampler, fragment),
            ],
        ),
        SetLayoutKind::Bloom => ("bloom", vec![b(BLOOM_INPUT, CombinedImageSampler, fragment)]),
        SetLayoutKind::Final => (
            "final",
            vec![
                b(FINAL_DISPLAY_INFO, UniformBuffer, fragment),
                b(FINAL_LIGHTING, CombinedImageSampler, fragment),
                b(FINAL_GBUFFER1, CombinedImageSampler, fragment),
                b(FINAL_GBUFFER2, CombinedImageSampler, fragment),
                b(FINAL_GBUFFER3, CombinedImageSampler, fragment),
                b(FINAL_DEPTH, CombinedImageSampler, fragment),
            ],
        ),
    };

    DescriptorSetLayoutDesc { name: name.to_string(), bindings: list }
}
