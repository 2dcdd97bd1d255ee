/// Framebuffers binding registry images (and swap chain images) to the passes

use crate::device::*;
use crate::error::{Error, Result};
use crate::registry::{AttachmentSlot, PrecomputedSlot, ResourceRegistry};
use crate::render_graph::{PassKind, RenderPassGraph};

/// Index of a bloom framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloomTarget {
    /// Post-effect buffer 0 (pass A)
    Post0 = 0,
    /// Post-effect buffer 1 (pass A)
    Post1 = 1,
    /// Lighting result (pass B)
    Lighting = 2,
}

/// Framebuffers of the steady-state passes; rebuilt on every resize
pub struct SteadyFramebuffers {
    pub geometry: FramebufferHandle,
    pub bloom: [FramebufferHandle; 3],
    /// One per swap chain image
    pub present: Vec<FramebufferHandle>,
    pub extent: (u32, u32),
}

impl SteadyFramebuffers {
    pub fn create(
        device: &mut dyn GraphicsDevice,
        registry: &ResourceRegistry,
        graph: &RenderPassGraph,
        swapchain: &SwapchainInfo,
    ) -> Result<Self> {
        let extent = registry.extent();
        let view = |slot: AttachmentSlot| registry.attachment(slot).map(|image| image.default_view());

        let geometry_views = PassKind::GeometryLighting
            .attachment_slots()
            .iter()
            .map(|slot| view(*slot))
            .collect::<Result<Vec<_>>>()?;
        let geometry = device.create_framebuffer(&FramebufferDesc {
            render_pass: graph.handle(PassKind::GeometryLighting)?,
            attachments: geometry_views,
            width: extent.0,
            height: extent.1,
            layers: 1,
        })?;

        let clear_pass = graph.handle(PassKind::BloomClear)?;
        let merge_pass = graph.handle(PassKind::BloomMerge)?;
        let bloom_targets = [
            (clear_pass, AttachmentSlot::PostEffect0),
            (clear_pass, AttachmentSlot::PostEffect1),
            (merge_pass, AttachmentSlot::LightingResult),
        ];
        let mut bloom = [FramebufferHandle::default(); 3];
        for (index, (pass, slot)) in bloom_targets.iter().enumerate() {
            bloom[index] = device.create_framebuffer(&FramebufferDesc {
                render_pass: *pass,
                attachments: vec![view(*slot)?],
                width: extent.0,
                height: extent.1,
                layers: 1,
            })?;
        }

        let final_pass = graph.handle(PassKind::Final)?;
        let mut present = Vec::with_capacity(swapchain.image_count());
        for swap_view in &swapchain.image_views {
            present.push(device.create_framebuffer(&FramebufferDesc {
                render_pass: final_pass,
                attachments: vec![*swap_view],
                width: swapchain.width,
                height: swapchain.height,
                layers: 1,
            })?);
        }

        Ok(Self { geometry, bloom, present, extent })
    }

    pub fn bloom(&self, target: BloomTarget) -> FramebufferHandle {
        self.bloom[target as usize]
    }

    pub fn present(&self, image_index: u32) -> Result<FramebufferHandle> {
        self.present
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("no framebuffer for swap chain image {}", image_index)))
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.geometry);
        for framebuffer in self.bloom {
            device.destroy_framebuffer(framebuffer);
        }
        for framebuffer in self.present {
            device.destroy_framebuffer(framebuffer);
        }
    }
}

/// One layered (6-face) prefilter target
#[derive(Debug, Clone, Copy)]
pub struct PrefilterTarget {
    pub framebuffer: FramebufferHandle,
    /// Face edge length at this mip
    pub size: u32,
}

/// Framebuffers of the one-shot prefilter pass
pub struct PrefilterFramebuffers {
    pub diffuse: Option<PrefilterTarget>,
    /// One per specular mip level
    pub specular: Vec<PrefilterTarget>,
}

impl PrefilterFramebuffers {
    /// Framebuffers for whichever irradiance maps are to be computed
    pub fn create(
        device: &mut dyn GraphicsDevice,
        registry: &ResourceRegistry,
        graph: &RenderPassGraph,
        compute_diffuse: bool,
        compute_specular: bool,
    ) -> Result<Self> {
        let pass = graph.handle(PassKind::Prefilter)?;
        let mut layered = |slot: PrecomputedSlot, mip: u32| -> Result<PrefilterTarget> {
            let image = registry.precomputed(slot)?;
            let view = image
                .layer_view(mip)
                .ok_or_else(|| Error::InvalidResource(format!("{} has no layered view for mip {}", image.name, mip)))?;
            let size = (image.desc.width >> mip).max(1);
            let framebuffer = device.create_framebuffer(&FramebufferDesc {
                render_pass: pass,
                attachments: vec![view],
                width: size,
                height: size,
                layers: 6,
            })?;
            Ok(PrefilterTarget { framebuffer, size })
        };

        let diffuse = if compute_diffuse {
            Some(layered(PrecomputedSlot::DiffuseIrradiance, 0)?)
        } else {
            None
        };

        let mut specular = Vec::new();
        if compute_specular {
            let levels = registry.precomputed(PrecomputedSlot::SpecularIrradiance)?.desc.mip_levels;
            for mip in 0..levels {
                specular.push(layered(PrecomputedSlot::SpecularIrradiance, mip)?);
            }
        }

        Ok(Self { diffuse, specular })
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        for target in self.diffuse.into_iter().chain(self.specular) {
            device.destroy_framebuffer(target.framebuffer);
        }
    }
}
