//! Fixtures shared by unit tests: in-memory shaders, scene assets and persisted maps

use std::path::Path;

use crate::assets::{MemoryAssetLoader, MeshData};
use crate::config::{full_mip_count, RendererConfig};
use crate::device::{Format, ImageData};
use crate::pipeline::PipelineKind;
use crate::registry::PrecomputedSlot;
use crate::scene::SceneDesc;

/// Smallest valid SPIR-V header stand-in; the mock device only checks it is non-empty
const FAKE_SPIRV: [u32; 2] = [0x0723_0203, 0];

pub fn image(width: u32, height: u32, format: Format, mip_levels: u32, is_cube: bool, fill: u8) -> ImageData {
    let mut data = ImageData {
        width,
        height,
        format,
        mip_levels,
        array_layers: if is_cube { 6 } else { 1 },
        is_cube,
        bytes: Vec::new(),
    };
    data.bytes = vec![fill; data.expected_size()];
    data
}

/// Loader holding a SPIR-V blob for every shader of every pipeline
pub fn shader_loader(config: &RendererConfig) -> MemoryAssetLoader {
    let loader = MemoryAssetLoader::new();
    for kind in PipelineKind::ALL {
        for name in kind.shaders() {
            loader.insert_spirv(config.shader_path(name), &FAKE_SPIRV);
        }
    }
    loader
}

/// One model named "cube" under `scene/`
pub fn test_scene() -> SceneDesc {
    SceneDesc::from_model_names(Path::new("scene"), &["cube"])
}

/// Shaders plus every file `scene` needs; models get an AO map when `with_ao`
pub fn scene_loader(config: &RendererConfig, scene: &SceneDesc, with_ao: bool) -> MemoryAssetLoader {
    let loader = shader_loader(config);
    loader
        .insert_texture(&scene.radiance_map, &image(16, 16, Format::R16G16B16A16_SFLOAT, 5, true, 1))
        .expect("radiance fixture encodes");
    for model in &scene.models {
        loader.insert_mesh(&model.mesh, MeshData::unit_cube());
        let mut maps = vec![&model.albedo, &model.normal, &model.roughness, &model.metalness];
        if with_ao {
            maps.push(&model.ambient_occlusion);
        }
        for (index, path) in maps.into_iter().enumerate() {
            loader
                .insert_texture(path, &image(4, 4, Format::R8G8B8A8_UNORM, 3, false, index as u8))
                .expect("material fixture encodes");
        }
    }
    loader
}

/// Persisted precomputed maps, small but shaped like the real ones
pub fn precomputed_file(slot: PrecomputedSlot) -> ImageData {
    match slot {
        PrecomputedSlot::BrdfLut => image(16, 16, Format::R32G32_SFLOAT, 1, false, 7),
        PrecomputedSlot::DiffuseIrradiance => image(4, 4, Format::R32G32B32A32_SFLOAT, 1, true, 8),
        PrecomputedSlot::SpecularIrradiance => {
            image(16, 16, Format::R32G32B32A32_SFLOAT, full_mip_count(16), true, 9)
        }
    }
}

pub fn insert_precomputed_files(loader: &MemoryAssetLoader, config: &RendererConfig) {
    for slot in PrecomputedSlot::ALL {
        loader
            .insert_texture(config.asset_path(slot.file_name()), &precomputed_file(slot))
            .expect("precomputed fixture encodes");
    }
}
