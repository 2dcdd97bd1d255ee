/// Resource registry: every image and buffer the deferred pipeline uses
///
/// Images and buffers live in arenas indexed by `ImageId` / `BufferId`. The ids
/// are stable for the renderer's lifetime: a resize destroys the device objects
/// of each resolution-dependent image and recreates them inside the same arena
/// slot, bumping that slot's generation. Anything holding an `ImageId` therefore
/// survives a resize; anything holding a raw device handle must be rebuilt.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::config::{full_mip_count, BRDF_LUT_SIZE, DIFF_IRRADIANCE_MAP_SIZE, SPEC_IRRADIANCE_MAP_SIZE};
use crate::device::*;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info};

new_key_type! {
    /// Stable id of a registry image
    pub struct ImageId;
    /// Stable id of a registry buffer
    pub struct BufferId;
}

// ============================================================================
// Slots
// ============================================================================

/// Resolution-dependent images of the steady-state passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    Depth,
    /// World-space normal + albedo
    GBuffer1,
    /// World position
    GBuffer2,
    /// Roughness, metalness, AO, misc
    GBuffer3,
    /// Lit HDR result
    LightingResult,
    PostEffect0,
    PostEffect1,
}

impl AttachmentSlot {
    pub const ALL: [AttachmentSlot; 7] = [
        AttachmentSlot::Depth,
        AttachmentSlot::GBuffer1,
        AttachmentSlot::GBuffer2,
        AttachmentSlot::GBuffer3,
        AttachmentSlot::LightingResult,
        AttachmentSlot::PostEffect0,
        AttachmentSlot::PostEffect1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttachmentSlot::Depth => "depth",
            AttachmentSlot::GBuffer1 => "gbuffer1",
            AttachmentSlot::GBuffer2 => "gbuffer2",
            AttachmentSlot::GBuffer3 => "gbuffer3",
            AttachmentSlot::LightingResult => "lighting_result",
            AttachmentSlot::PostEffect0 => "post_effect0",
            AttachmentSlot::PostEffect1 => "post_effect1",
        }
    }

    /// Color format of the slot (the depth slot's format is chosen at runtime)
    pub fn color_format(&self) -> Option<Format> {
        match self {
            AttachmentSlot::Depth => None,
            AttachmentSlot::GBuffer1 | AttachmentSlot::GBuffer2 => Some(Format::R32G32B32A32_SFLOAT),
            AttachmentSlot::GBuffer3 => Some(Format::R8G8B8A8_UNORM),
            AttachmentSlot::LightingResult | AttachmentSlot::PostEffect0 | AttachmentSlot::PostEffect1 => {
                Some(Format::R16G16B16A16_SFLOAT)
            }
        }
    }

    pub fn usage(&self) -> ImageUsage {
        match self {
            AttachmentSlot::Depth => {
                ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::INPUT_ATTACHMENT | ImageUsage::SAMPLED
            }
            AttachmentSlot::GBuffer1 | AttachmentSlot::GBuffer2 | AttachmentSlot::GBuffer3 => {
                ImageUsage::COLOR_ATTACHMENT | ImageUsage::INPUT_ATTACHMENT | ImageUsage::SAMPLED
            }
            _ => ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
        }
    }

    fn sampler(&self) -> SamplerDesc {
        match self {
            AttachmentSlot::PostEffect0 | AttachmentSlot::PostEffect1 => SamplerDesc::linear_clamp(),
            _ => SamplerDesc::nearest_clamp(),
        }
    }
}

/// Resolution-independent images produced by precomputation (or loaded from disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecomputedSlot {
    BrdfLut,
    DiffuseIrradiance,
    SpecularIrradiance,
}

impl PrecomputedSlot {
    pub const ALL: [PrecomputedSlot; 3] = [
        PrecomputedSlot::BrdfLut,
        PrecomputedSlot::DiffuseIrradiance,
        PrecomputedSlot::SpecularIrradiance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PrecomputedSlot::BrdfLut => "brdf_lut",
            PrecomputedSlot::DiffuseIrradiance => "diffuse_irradiance",
            PrecomputedSlot::SpecularIrradiance => "specular_irradiance",
        }
    }

    /// File the map persists to inside the asset directory
    pub fn file_name(&self) -> &'static str {
        match self {
            PrecomputedSlot::BrdfLut => "brdf_lut.dds",
            PrecomputedSlot::DiffuseIrradiance => "diffuse_irradiance.dds",
            PrecomputedSlot::SpecularIrradiance => "specular_irradiance.dds",
        }
    }

    /// Shape of a freshly computed map
    pub fn computed_desc(&self) -> ImageDesc {
        match self {
            PrecomputedSlot::BrdfLut => ImageDesc::new_2d(
                BRDF_LUT_SIZE,
                BRDF_LUT_SIZE,
                Format::R32G32_SFLOAT,
                ImageUsage::STORAGE | ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC,
            ),
            PrecomputedSlot::DiffuseIrradiance => ImageDesc::new_cube(
                DIFF_IRRADIANCE_MAP_SIZE,
                Format::R32G32B32A32_SFLOAT,
                ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC,
                1,
            ),
            PrecomputedSlot::SpecularIrradiance => ImageDesc::new_cube(
                SPEC_IRRADIANCE_MAP_SIZE,
                Format::R32G32B32A32_SFLOAT,
                ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC,
                full_mip_count(SPEC_IRRADIANCE_MAP_SIZE),
            ),
        }
    }

    fn sampler(&self, mip_levels: u32) -> SamplerDesc {
        match self {
            PrecomputedSlot::BrdfLut => SamplerDesc::linear_clamp(),
            _ => SamplerDesc::trilinear(mip_levels, AddressMode::ClampToEdge),
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

/// A registry image and its device objects
#[derive(Debug, Clone)]
pub struct RegistryImage {
    pub name: String,
    pub desc: ImageDesc,
    pub image: ImageHandle,
    /// `views[0]` covers the whole image; cube maps add one 6-layer view per mip
    pub views: Vec<ImageViewHandle>,
    pub sampler: Option<SamplerHandle>,
    /// Logical layout after the last completed pass or transition
    pub layout: ImageLayout,
    /// Bumped every time the device objects are recreated
    pub generation: u32,
    pub resolution_dependent: bool,
}

impl RegistryImage {
    pub fn default_view(&self) -> ImageViewHandle {
        self.views[0]
    }

    /// 6-layer view of one mip level (cube maps only)
    pub fn layer_view(&self, mip: u32) -> Option<ImageViewHandle> {
        self.views.get(1 + mip as usize).copied()
    }

    pub fn sampled(&self, layout: ImageLayout) -> Result<DescriptorResource> {
        let sampler = self
            .sampler
            .ok_or_else(|| Error::InvalidResource(format!("{} has no sampler", self.name)))?;
        Ok(DescriptorResource::CombinedImageSampler { view: self.default_view(), sampler, layout })
    }
}

/// A registry buffer
#[derive(Debug, Clone)]
pub struct RegistryBuffer {
    pub name: String,
    pub desc: BufferDesc,
    pub buffer: BufferHandle,
}

// ============================================================================
// Registry
// ============================================================================

pub struct ResourceRegistry {
    images: SlotMap<ImageId, RegistryImage>,
    buffers: SlotMap<BufferId, RegistryBuffer>,
    attachments: FxHashMap<AttachmentSlot, ImageId>,
    precomputed: FxHashMap<PrecomputedSlot, ImageId>,
    depth_format: Option<Format>,
    extent: (u32, u32),
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            attachments: FxHashMap::default(),
            precomputed: FxHashMap::default(),
            depth_format: None,
            extent: (0, 0),
        }
    }

    // ===== ATTACHMENTS =====

    /// Allocate a device-local image with a default view and an optional sampler
    ///
    /// The image is left in `Undefined` until the first pass writing it runs.
    pub fn create_attachment_image(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        format: Format,
        usage: ImageUsage,
        resolution: (u32, u32),
        sampler: Option<SamplerDesc>,
    ) -> Result<ImageId> {
        let desc = ImageDesc::new_2d(resolution.0, resolution.1, format, usage);
        let (image, views) = Self::allocate(device, name, &desc)?;
        let sampler = match sampler {
            Some(sampler_desc) => Some(device.create_sampler(&sampler_desc)?),
            None => None,
        };
        Ok(self.images.insert(RegistryImage {
            name: name.to_string(),
            desc,
            image,
            views,
            sampler,
            layout: ImageLayout::Undefined,
            generation: 0,
            resolution_dependent: true,
        }))
    }

    /// Create every attachment slot at `resolution`, picking the depth format first
    pub fn create_attachments(&mut self, device: &mut dyn GraphicsDevice, resolution: (u32, u32)) -> Result<()> {
        let depth_format = device.find_supported_format(
            &[Format::D32_SFLOAT, Format::D32_SFLOAT_S8_UINT, Format::D24_UNORM_S8_UINT],
            FormatFeature::DepthStencilAttachment,
        )?;
        self.depth_format = Some(depth_format);

        for slot in AttachmentSlot::ALL {
            let format = slot.color_format().unwrap_or(depth_format);
            let id = self.create_attachment_image(device, slot.name(), format, slot.usage(), resolution, Some(slot.sampler()))?;
            self.attachments.insert(slot, id);
        }
        self.extent = resolution;

        engine_info!(
            "laugh::Registry",
            "Created {} attachments at {}x{} (depth {:?})",
            AttachmentSlot::ALL.len(),
            resolution.0,
            resolution.1,
            depth_format
        );
        Ok(())
    }

    /// Destroy and recreate every resolution-dependent image at `resolution`
    ///
    /// Precomputed maps, textures and buffers are untouched. Ids stay valid; the
    /// new images start in `Undefined`.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, resolution: (u32, u32)) -> Result<()> {
        let ids: Vec<ImageId> = self
            .images
            .iter()
            .filter(|(_, entry)| entry.resolution_dependent)
            .map(|(id, _)| id)
            .collect();

        for id in ids {
            let entry = &mut self.images[id];
            for view in entry.views.drain(..) {
                device.destroy_image_view(view);
            }
            device.destroy_image(entry.image);

            entry.desc.width = resolution.0;
            entry.desc.height = resolution.1;
            let (image, views) = Self::allocate(device, &entry.name, &entry.desc)?;
            entry.image = image;
            entry.views = views;
            entry.layout = ImageLayout::Undefined;
            entry.generation += 1;
        }
        self.extent = resolution;

        engine_debug!("laugh::Registry", "Resized attachments to {}x{}", resolution.0, resolution.1);
        Ok(())
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn depth_format(&self) -> Result<Format> {
        self.depth_format
            .ok_or_else(|| Error::InvalidResource("attachments not created yet".to_string()))
    }

    pub fn attachment_id(&self, slot: AttachmentSlot) -> Result<ImageId> {
        self.attachments
            .get(&slot)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("attachment {} not created", slot.name())))
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Result<&RegistryImage> {
        self.image(self.attachment_id(slot)?)
    }

    pub fn attachment_format(&self, slot: AttachmentSlot) -> Result<Format> {
        match slot.color_format() {
            Some(format) => Ok(format),
            None => self.depth_format(),
        }
    }

    // ===== PRECOMPUTED MAPS =====

    /// Allocate an empty precomputed map to be filled by the GPU
    ///
    /// Cube maps get one 6-layer view per mip level for layered prefilter rendering.
    pub fn create_precomputed(&mut self, device: &mut dyn GraphicsDevice, slot: PrecomputedSlot) -> Result<ImageId> {
        let desc = slot.computed_desc();
        self.insert_precomputed(device, slot, desc, None)
    }

    /// Create a precomputed map from persisted data, left in `ShaderReadOnly`
    pub fn load_precomputed(
        &mut self,
        device: &mut dyn GraphicsDevice,
        slot: PrecomputedSlot,
        data: &ImageData,
    ) -> Result<ImageId> {
        let desc = data.image_desc(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST | ImageUsage::TRANSFER_SRC);
        self.insert_precomputed(device, slot, desc, Some(data))
    }

    fn insert_precomputed(
        &mut self,
        device: &mut dyn GraphicsDevice,
        slot: PrecomputedSlot,
        desc: ImageDesc,
        data: Option<&ImageData>,
    ) -> Result<ImageId> {
        if self.precomputed.contains_key(&slot) {
            return Err(Error::InvalidResource(format!("{} already exists", slot.name())));
        }
        let (image, views) = Self::allocate(device, slot.name(), &desc)?;
        let mut layout = ImageLayout::Undefined;
        if let Some(data) = data {
            device.upload_image(image, data, ImageLayout::ShaderReadOnly)?;
            layout = ImageLayout::ShaderReadOnly;
        }
        let sampler = device.create_sampler(&slot.sampler(desc.mip_levels))?;

        let id = self.images.insert(RegistryImage {
            name: slot.name().to_string(),
            desc,
            image,
            views,
            sampler: Some(sampler),
            layout,
            generation: 0,
            resolution_dependent: false,
        });
        self.precomputed.insert(slot, id);
        Ok(id)
    }

    pub fn precomputed_id(&self, slot: PrecomputedSlot) -> Result<ImageId> {
        self.precomputed
            .get(&slot)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("{} not created", slot.name())))
    }

    pub fn precomputed(&self, slot: PrecomputedSlot) -> Result<&RegistryImage> {
        self.image(self.precomputed_id(slot)?)
    }

    // ===== TEXTURES =====

    /// Upload a sampled texture (model maps, radiance cube), left in `ShaderReadOnly`
    pub fn create_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        data: &ImageData,
        address_mode: AddressMode,
    ) -> Result<ImageId> {
        let desc = data.image_desc(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST);
        let (image, views) = Self::allocate(device, name, &desc)?;
        device.upload_image(image, data, ImageLayout::ShaderReadOnly)?;
        let sampler = device.create_sampler(&SamplerDesc::trilinear(desc.mip_levels, address_mode))?;
        Ok(self.images.insert(RegistryImage {
            name: name.to_string(),
            desc,
            image,
            views,
            sampler: Some(sampler),
            layout: ImageLayout::ShaderReadOnly,
            generation: 0,
            resolution_dependent: false,
        }))
    }

    // ===== LOOKUP & LAYOUT =====

    pub fn image(&self, id: ImageId) -> Result<&RegistryImage> {
        self.images
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Record a layout reached by GPU work (render pass end, barrier)
    pub fn set_layout(&mut self, id: ImageId, layout: ImageLayout) -> Result<()> {
        let entry = self
            .images
            .get_mut(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))?;
        entry.layout = layout;
        Ok(())
    }

    /// Immediate transition of the whole image from its tracked layout to `new_layout`
    pub fn transition(&mut self, device: &mut dyn GraphicsDevice, id: ImageId, new_layout: ImageLayout) -> Result<()> {
        let entry = self
            .images
            .get_mut(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))?;
        if entry.layout == new_layout {
            return Ok(());
        }
        device.transition_image_layout(entry.image, entry.desc.full_range(), entry.layout, new_layout)?;
        engine_debug!(
            "laugh::Registry",
            "{}: {:?} -> {:?}",
            entry.name,
            entry.layout,
            new_layout
        );
        entry.layout = new_layout;
        Ok(())
    }

    // ===== BUFFERS =====

    pub fn create_buffer(&mut self, device: &mut dyn GraphicsDevice, name: &str, desc: BufferDesc) -> Result<BufferId> {
        let buffer = device.create_buffer(&desc).map_err(|e| Self::allocation_error(name, e))?;
        Ok(self.buffers.insert(RegistryBuffer { name: name.to_string(), desc, buffer }))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&RegistryBuffer> {
        self.buffers
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale buffer id {:?}", id)))
    }

    pub fn write_buffer(&self, device: &mut dyn GraphicsDevice, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        device.write_buffer(self.buffer(id)?.buffer, offset, data)
    }

    // ===== TEARDOWN =====

    /// Destroy every device object the registry owns
    pub fn destroy_all(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, entry) in self.images.drain() {
            for view in entry.views {
                device.destroy_image_view(view);
            }
            if let Some(sampler) = entry.sampler {
                device.destroy_sampler(sampler);
            }
            device.destroy_image(entry.image);
        }
        for (_, entry) in self.buffers.drain() {
            device.destroy_buffer(entry.buffer);
        }
        self.attachments.clear();
        self.precomputed.clear();
    }

    // ===== INTERNALS =====

    fn allocate(device: &mut dyn GraphicsDevice, name: &str, desc: &ImageDesc) -> Result<(ImageHandle, Vec<ImageViewHandle>)> {
        let image = device.create_image(desc).map_err(|e| Self::allocation_error(name, e))?;
        let aspect = ImageAspect::for_format(desc.format);

        let mut views = Vec::new();
        let full = ImageViewDesc {
            view_type: if desc.cube_compatible { ImageViewType::Cube } else { ImageViewType::D2 },
            format: desc.format,
            aspect,
            range: desc.full_range(),
        };
        views.push(device.create_image_view(image, &full)?);

        if desc.cube_compatible {
            for mip in 0..desc.mip_levels {
                let layered = ImageViewDesc {
                    view_type: ImageViewType::D2Array,
                    format: desc.format,
                    aspect,
                    range: SubresourceRange { base_mip: mip, mip_count: 1, base_layer: 0, layer_count: desc.array_layers },
                };
                views.push(device.create_image_view(image, &layered)?);
            }
        }
        Ok((image, views))
    }

    fn allocation_error(name: &str, error: Error) -> Error {
        match error {
            Error::OutOfMemory => Error::AllocationError(format!("{}: out of device memory", name)),
            other => other,
        }
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "resource_registry_tests.rs"]
mod tests;
