/// Skybox: the environment cube drawn first into the G-buffers, and the
/// radiance map feeding the prefilter pass

use crate::assets::{AssetLoader, MeshData};
use crate::device::{AddressMode, GraphicsDevice};
use crate::error::{Error, Result};
use crate::pipeline::{SkyboxPushConstants, SKYBOX_MATERIAL_TYPE};
use crate::registry::{ImageId, ResourceRegistry};
use crate::scene::gpu_mesh::GpuMesh;
use crate::scene::SceneDesc;
use crate::engine_debug;

pub struct Skybox {
    pub mesh: GpuMesh,
    /// Unfiltered HDR environment cube map
    pub radiance: ImageId,
}

impl Skybox {
    pub fn load(
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        loader: &dyn AssetLoader,
        desc: &SceneDesc,
    ) -> Result<Self> {
        let mesh_data = match &desc.skybox_mesh {
            Some(path) => loader.load_mesh(path)?,
            None => MeshData::unit_cube(),
        };
        let mesh = GpuMesh::upload(device, registry, "skybox", &mesh_data)?;

        let radiance_data = loader.load_texture(&desc.radiance_map)?;
        if !radiance_data.is_cube {
            return Err(Error::AssetError(format!("{} is not a cube map", desc.radiance_map.display())));
        }
        let radiance = registry.create_texture(device, "radiance", &radiance_data, AddressMode::ClampToEdge)?;
        engine_debug!(
            "laugh::Renderer",
            "Radiance map {}x{} with {} mips",
            radiance_data.width,
            radiance_data.height,
            radiance_data.mip_levels
        );

        Ok(Self { mesh, radiance })
    }

    pub fn push_constants(&self) -> SkyboxPushConstants {
        SkyboxPushConstants { material_type: SKYBOX_MATERIAL_TYPE }
    }
}
