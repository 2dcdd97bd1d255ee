/// Model entity: mesh buffers, material textures, per-model uniforms and its own descriptor set

use std::path::{Path, PathBuf};

use glam::Mat4;

use crate::assets::AssetLoader;
use crate::device::*;
use crate::error::{Error, Result};
use crate::pipeline::{bindings, GeometryPushConstants, Pipelines, SetLayoutKind};
use crate::registry::{ImageId, ResourceRegistry};
use crate::scene::gpu_mesh::GpuMesh;
use crate::uniform_blob::{PerModelData, Transforms, UniformBlob, UniformSlot};
use crate::engine_info;

/// Material id of ordinary lit models (0 is the skybox)
pub const DEFAULT_MATERIAL_ID: u32 = 1;

/// Where a model's mesh and maps come from
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDesc {
    pub name: String,
    pub mesh: PathBuf,
    pub albedo: PathBuf,
    pub normal: PathBuf,
    pub roughness: PathBuf,
    pub metalness: PathBuf,
    /// Used only if the file exists
    pub ambient_occlusion: PathBuf,
    pub transform: Mat4,
    pub material_id: u32,
}

impl ModelDesc {
    /// `<models_dir>/<name>.obj` with maps `<textures_dir>/<name>/{A,N,R,M,AO}.dds`
    pub fn from_name(name: &str, models_dir: &Path, textures_dir: &Path) -> Self {
        let maps = textures_dir.join(name);
        Self {
            name: name.to_string(),
            mesh: models_dir.join(format!("{}.obj", name)),
            albedo: maps.join("A.dds"),
            normal: maps.join("N.dds"),
            roughness: maps.join("R.dds"),
            metalness: maps.join("M.dds"),
            ambient_occlusion: maps.join("AO.dds"),
            // Assets are authored facing away from the default camera
            transform: Mat4::from_rotation_y(std::f32::consts::PI),
            material_id: DEFAULT_MATERIAL_ID,
        }
    }
}

/// Registry images of a model's material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelTextures {
    pub albedo: ImageId,
    pub normal: ImageId,
    pub roughness: ImageId,
    pub metalness: ImageId,
    pub ambient_occlusion: Option<ImageId>,
}

pub struct Model {
    pub name: String,
    pub mesh: GpuMesh,
    pub textures: ModelTextures,
    pub transform: Mat4,
    pub material_id: u32,
    pub uniforms: UniformSlot<PerModelData>,
    descriptor_set: Option<DescriptorSetHandle>,
}

impl Model {
    /// Load mesh and maps, and reserve the model's uniform block
    pub fn load(
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        loader: &dyn AssetLoader,
        blob: &mut UniformBlob,
        desc: &ModelDesc,
    ) -> Result<Self> {
        let mesh_data = loader.load_mesh(&desc.mesh)?;
        let mesh = GpuMesh::upload(device, registry, &desc.name, &mesh_data)?;

        let mut texture = |suffix: &str, path: &Path| -> Result<ImageId> {
            let data = loader.load_texture(path)?;
            registry.create_texture(device, &format!("{}_{}", desc.name, suffix), &data, AddressMode::Repeat)
        };
        let albedo = texture("albedo", &desc.albedo)?;
        let normal = texture("normal", &desc.normal)?;
        let roughness = texture("roughness", &desc.roughness)?;
        let metalness = texture("metalness", &desc.metalness)?;
        let ambient_occlusion = if loader.exists(&desc.ambient_occlusion) {
            Some(texture("ao", &desc.ambient_occlusion)?)
        } else {
            None
        };

        let uniforms = blob.allocate_for::<PerModelData>()?;
        blob.write(uniforms, &PerModelData::new(desc.transform));

        engine_info!(
            "laugh::Renderer",
            "Loaded model {} ({} indices{})",
            desc.name,
            mesh.index_count,
            if ambient_occlusion.is_some() { ", AO map" } else { "" }
        );

        Ok(Self {
            name: desc.name.clone(),
            mesh,
            textures: ModelTextures { albedo, normal, roughness, metalness, ambient_occlusion },
            transform: desc.transform,
            material_id: desc.material_id,
            uniforms,
            descriptor_set: None,
        })
    }

    pub fn has_ao_map(&self) -> bool {
        self.textures.ambient_occlusion.is_some()
    }

    pub fn push_constants(&self) -> GeometryPushConstants {
        GeometryPushConstants { material_id: self.material_id, has_ao_map: self.has_ao_map() as u32 }
    }

    /// Allocate and fill the model's geometry set
    ///
    /// Without an AO map the AO binding samples the albedo map; the shader
    /// ignores it because `has_ao_map` is 0.
    pub fn create_descriptor_set(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipelines: &Pipelines,
        registry: &ResourceRegistry,
        uniform_buffer: BufferHandle,
        transforms: UniformSlot<Transforms>,
    ) -> Result<()> {
        use bindings::*;

        let sampled = |id: ImageId| registry.image(id)?.sampled(ImageLayout::ShaderReadOnly);
        let textures = self.textures;
        let writes = [
            DescriptorWrite::new(GEOMETRY_TRANSFORMS, transforms.descriptor(uniform_buffer)),
            DescriptorWrite::new(GEOMETRY_PER_MODEL, self.uniforms.descriptor(uniform_buffer)),
            DescriptorWrite::new(GEOMETRY_ALBEDO, sampled(textures.albedo)?),
            DescriptorWrite::new(GEOMETRY_NORMAL, sampled(textures.normal)?),
            DescriptorWrite::new(GEOMETRY_ROUGHNESS, sampled(textures.roughness)?),
            DescriptorWrite::new(GEOMETRY_METALNESS, sampled(textures.metalness)?),
            DescriptorWrite::new(GEOMETRY_AO, sampled(textures.ambient_occlusion.unwrap_or(textures.albedo))?),
        ];

        let set = match self.descriptor_set {
            Some(set) => set,
            None => device.allocate_descriptor_set(pipelines.set_layout(SetLayoutKind::Geometry)?)?,
        };
        self.descriptor_set = Some(set);
        device.update_descriptor_set(set, &writes)
    }

    pub fn descriptor_set(&self) -> Result<DescriptorSetHandle> {
        self.descriptor_set
            .ok_or_else(|| Error::InvalidResource(format!("model {} has no descriptor set", self.name)))
    }

    /// Refresh the per-model block after a transform change
    pub fn write_uniforms(&self, blob: &mut UniformBlob) {
        blob.write(self.uniforms, &PerModelData::new(self.transform));
    }

    /// Free the descriptor set; buffers and textures belong to the registry
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(set) = self.descriptor_set.take() {
            device.free_descriptor_set(set);
        }
    }
}
