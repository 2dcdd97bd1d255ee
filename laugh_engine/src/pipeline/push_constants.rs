/// Push constant blocks (small per-draw scalars)

use bytemuck::{Pod, Zeroable};

/// Specular prefilter: roughness of the mip being rendered
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrefilterPushConstants {
    pub roughness: f32,
}

/// Skybox: material id written into the G-buffer so lighting passes it through
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SkyboxPushConstants {
    pub material_type: u32,
}

/// Geometry: per-model material selection
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GeometryPushConstants {
    pub material_id: u32,
    /// 1 when the model carries its own AO map
    pub has_ao_map: u32,
}

/// Lighting: number of specular irradiance mips for roughness -> lod mapping
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LightingPushConstants {
    pub spec_mip_levels: u32,
}

/// Bloom blur direction
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BlurPushConstants {
    /// 1 = horizontal, 0 = vertical
    pub is_horizontal: u32,
}

/// Material id reserved for the skybox
pub const SKYBOX_MATERIAL_TYPE: u32 = 0;

/// Size of a push constant block
pub const fn push_size<T: Pod>() -> u32 {
    std::mem::size_of::<T>() as u32
}
