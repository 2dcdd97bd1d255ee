/// Render pass graph: the fixed set of passes of the deferred pipeline
///
/// Order of a steady-state frame:
///
/// ```text
/// GeometryLighting   subpass 0: depth + 3 G-buffers
///                    subpass 1: input-attachment reads -> lighting result
/// BloomClear         brightness mask + ping-pong blur into post-effect buffers
/// BloomMerge         additive blend back onto the lighting result (LOAD)
/// Final              samples everything, writes the swap chain image
/// ```
///
/// `Prefilter` runs once before steady state (diffuse + specular irradiance).

use rustc_hash::FxHashMap;

use crate::device::*;
use crate::error::{Error, Result};
use crate::registry::{AttachmentSlot, ResourceRegistry};
use crate::engine_debug;

/// The render passes of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Prefilter,
    GeometryLighting,
    BloomClear,
    BloomMerge,
    Final,
}

impl PassKind {
    pub const ALL: [PassKind; 5] = [
        PassKind::Prefilter,
        PassKind::GeometryLighting,
        PassKind::BloomClear,
        PassKind::BloomMerge,
        PassKind::Final,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Prefilter => "prefilter",
            PassKind::GeometryLighting => "geometry_lighting",
            PassKind::BloomClear => "bloom_clear",
            PassKind::BloomMerge => "bloom_merge",
            PassKind::Final => "final",
        }
    }

    /// Registry slots bound as attachments, in attachment order
    ///
    /// Empty for passes whose attachments are not registry attachments
    /// (prefilter targets, swap chain images).
    pub fn attachment_slots(&self) -> &'static [AttachmentSlot] {
        match self {
            PassKind::GeometryLighting => &[
                AttachmentSlot::Depth,
                AttachmentSlot::GBuffer1,
                AttachmentSlot::GBuffer2,
                AttachmentSlot::GBuffer3,
                AttachmentSlot::LightingResult,
            ],
            PassKind::BloomMerge => &[AttachmentSlot::LightingResult],
            _ => &[],
        }
    }

    /// Clear values in attachment order
    pub fn clear_values(&self) -> Vec<ClearValue> {
        let zero = ClearValue::Color([0.0, 0.0, 0.0, 0.0]);
        match self {
            PassKind::GeometryLighting => vec![
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
                zero,
                zero,
                zero,
                zero,
            ],
            PassKind::BloomMerge => Vec::new(),
            PassKind::Prefilter | PassKind::BloomClear | PassKind::Final => vec![zero],
        }
    }
}

// ============================================================================
// Pass tables
// ============================================================================

const IRRADIANCE_FORMAT: Format = Format::R32G32B32A32_SFLOAT;
const HDR_FORMAT: Format = Format::R16G16B16A16_SFLOAT;

fn attachment(format: Format, load_op: LoadOp, initial: ImageLayout, final_layout: ImageLayout) -> AttachmentDesc {
    AttachmentDesc {
        format,
        load_op,
        store_op: StoreOp::Store,
        initial_layout: initial,
        final_layout,
    }
}

fn single_color_subpass() -> SubpassDesc {
    SubpassDesc {
        color_attachments: vec![AttachmentRef::new(0, ImageLayout::ColorAttachment)],
        ..Default::default()
    }
}

/// Previous sampling of the target must finish before this pass writes it,
/// and this pass's writes must land before later fragment shaders sample it.
fn sampled_target_dependencies() -> Vec<SubpassDependency> {
    vec![
        SubpassDependency {
            src_subpass: SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage: PipelineStage::FRAGMENT_SHADER,
            dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            src_access: Access::SHADER_READ,
            dst_access: Access::COLOR_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE,
            by_region: true,
        },
        SubpassDependency {
            src_subpass: 0,
            dst_subpass: SUBPASS_EXTERNAL,
            src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: PipelineStage::FRAGMENT_SHADER,
            src_access: Access::COLOR_ATTACHMENT_WRITE,
            dst_access: Access::SHADER_READ,
            by_region: true,
        },
    ]
}

/// Environment prefilter: one layered color target, left as an attachment
/// (precomputation transitions it for sampling once all levels are done)
pub fn prefilter_pass_desc() -> RenderPassDesc {
    RenderPassDesc {
        name: PassKind::Prefilter.name().to_string(),
        attachments: vec![attachment(
            IRRADIANCE_FORMAT,
            LoadOp::Clear,
            ImageLayout::Undefined,
            ImageLayout::ColorAttachment,
        )],
        subpasses: vec![single_color_subpass()],
        dependencies: vec![SubpassDependency {
            src_subpass: SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage: PipelineStage::BOTTOM_OF_PIPE,
            dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            src_access: Access::MEMORY_READ,
            dst_access: Access::COLOR_ATTACHMENT_WRITE,
            by_region: true,
        }],
    }
}

/// Geometry + lighting: attachments [depth, gb1, gb2, gb3, lighting]
pub fn geometry_lighting_pass_desc(depth_format: Format) -> RenderPassDesc {
    let gbuffer = |slot: AttachmentSlot| {
        attachment(
            slot.color_format().unwrap_or(HDR_FORMAT),
            LoadOp::Clear,
            ImageLayout::Undefined,
            ImageLayout::ShaderReadOnly,
        )
    };

    RenderPassDesc {
        name: PassKind::GeometryLighting.name().to_string(),
        attachments: vec![
            attachment(depth_format, LoadOp::Clear, ImageLayout::Undefined, ImageLayout::DepthStencilReadOnly),
            gbuffer(AttachmentSlot::GBuffer1),
            gbuffer(AttachmentSlot::GBuffer2),
            gbuffer(AttachmentSlot::GBuffer3),
            attachment(HDR_FORMAT, LoadOp::Clear, ImageLayout::Undefined, ImageLayout::ShaderReadOnly),
        ],
        subpasses: vec![
            SubpassDesc {
                color_attachments: vec![
                    AttachmentRef::new(1, ImageLayout::ColorAttachment),
                    AttachmentRef::new(2, ImageLayout::ColorAttachment),
                    AttachmentRef::new(3, ImageLayout::ColorAttachment),
                ],
                depth_attachment: Some(AttachmentRef::new(0, ImageLayout::DepthStencilAttachment)),
                input_attachments: vec![],
            },
            SubpassDesc {
                color_attachments: vec![AttachmentRef::new(4, ImageLayout::ColorAttachment)],
                depth_attachment: Some(AttachmentRef::new(0, ImageLayout::DepthStencilReadOnly)),
                input_attachments: vec![
                    AttachmentRef::new(0, ImageLayout::DepthStencilReadOnly),
                    AttachmentRef::new(1, ImageLayout::ShaderReadOnly),
                    AttachmentRef::new(2, ImageLayout::ShaderReadOnly),
                    AttachmentRef::new(3, ImageLayout::ShaderReadOnly),
                ],
            },
        ],
        dependencies: vec![
            // Previous frame's final pass sampled these images
            SubpassDependency {
                src_subpass: SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage: PipelineStage::FRAGMENT_SHADER | PipelineStage::BOTTOM_OF_PIPE,
                dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT | PipelineStage::EARLY_FRAGMENT_TESTS,
                src_access: Access::SHADER_READ | Access::MEMORY_READ,
                dst_access: Access::COLOR_ATTACHMENT_WRITE | Access::DEPTH_STENCIL_ATTACHMENT_WRITE,
                by_region: true,
            },
            SubpassDependency {
                src_subpass: 0,
                dst_subpass: 1,
                src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStage::EARLY_FRAGMENT_TESTS
                    | PipelineStage::LATE_FRAGMENT_TESTS,
                dst_stage: PipelineStage::FRAGMENT_SHADER
                    | PipelineStage::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStage::EARLY_FRAGMENT_TESTS,
                src_access: Access::COLOR_ATTACHMENT_WRITE | Access::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access: Access::INPUT_ATTACHMENT_READ
                    | Access::COLOR_ATTACHMENT_READ
                    | Access::COLOR_ATTACHMENT_WRITE
                    | Access::DEPTH_STENCIL_ATTACHMENT_READ,
                by_region: true,
            },
            SubpassDependency {
                src_subpass: 1,
                dst_subpass: SUBPASS_EXTERNAL,
                src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
                dst_stage: PipelineStage::FRAGMENT_SHADER,
                src_access: Access::COLOR_ATTACHMENT_WRITE,
                dst_access: Access::SHADER_READ,
                by_region: true,
            },
        ],
    }
}

/// Bloom pass A: clears a post-effect buffer (brightness mask, blur steps)
pub fn bloom_clear_pass_desc() -> RenderPassDesc {
    RenderPassDesc {
        name: PassKind::BloomClear.name().to_string(),
        attachments: vec![attachment(HDR_FORMAT, LoadOp::Clear, ImageLayout::Undefined, ImageLayout::ShaderReadOnly)],
        subpasses: vec![single_color_subpass()],
        dependencies: sampled_target_dependencies(),
    }
}

/// Bloom pass B: loads the lighting result and blends the blur onto it
pub fn bloom_merge_pass_desc() -> RenderPassDesc {
    RenderPassDesc {
        name: PassKind::BloomMerge.name().to_string(),
        attachments: vec![attachment(
            HDR_FORMAT,
            LoadOp::Load,
            ImageLayout::ShaderReadOnly,
            ImageLayout::ShaderReadOnly,
        )],
        subpasses: vec![single_color_subpass()],
        dependencies: sampled_target_dependencies(),
    }
}

/// Final composition into the swap chain image
pub fn final_pass_desc(swapchain_format: Format) -> RenderPassDesc {
    RenderPassDesc {
        name: PassKind::Final.name().to_string(),
        attachments: vec![attachment(swapchain_format, LoadOp::Clear, ImageLayout::Undefined, ImageLayout::PresentSrc)],
        subpasses: vec![single_color_subpass()],
        dependencies: vec![SubpassDependency {
            src_subpass: SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            src_access: Access::empty(),
            dst_access: Access::COLOR_ATTACHMENT_WRITE,
            by_region: false,
        }],
    }
}

/// Descriptor of one pass for the current formats
pub fn pass_desc(kind: PassKind, depth_format: Format, swapchain_format: Format) -> RenderPassDesc {
    match kind {
        PassKind::Prefilter => prefilter_pass_desc(),
        PassKind::GeometryLighting => geometry_lighting_pass_desc(depth_format),
        PassKind::BloomClear => bloom_clear_pass_desc(),
        PassKind::BloomMerge => bloom_merge_pass_desc(),
        PassKind::Final => final_pass_desc(swapchain_format),
    }
}

// ============================================================================
// Graph
// ============================================================================

struct BuiltPass {
    handle: RenderPassHandle,
    desc: RenderPassDesc,
}

/// Device render passes of the pipeline, validated before creation
pub struct RenderPassGraph {
    passes: FxHashMap<PassKind, BuiltPass>,
}

impl RenderPassGraph {
    /// Validate and create every pass
    pub fn build(device: &mut dyn GraphicsDevice, registry: &ResourceRegistry, swapchain_format: Format) -> Result<Self> {
        let depth_format = registry.depth_format()?;
        let mut graph = Self { passes: FxHashMap::default() };
        for kind in PassKind::ALL {
            let desc = pass_desc(kind, depth_format, swapchain_format);
            graph.create(device, kind, desc)?;
        }
        engine_debug!("laugh::RenderGraph", "Built {} render passes", graph.passes.len());
        Ok(graph)
    }

    /// Recreate only the passes whose attachment formats changed
    ///
    /// Returns the kinds that were rebuilt; pipelines and framebuffers of those
    /// passes must be rebuilt too.
    pub fn rebuild_changed(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &ResourceRegistry,
        swapchain_format: Format,
    ) -> Result<Vec<PassKind>> {
        let depth_format = registry.depth_format()?;
        let mut rebuilt = Vec::new();
        for kind in PassKind::ALL {
            let desc = pass_desc(kind, depth_format, swapchain_format);
            let unchanged = self.passes.get(&kind).map(|p| p.desc == desc).unwrap_or(false);
            if unchanged {
                continue;
            }
            if let Some(old) = self.passes.remove(&kind) {
                device.destroy_render_pass(old.handle);
            }
            self.create(device, kind, desc)?;
            rebuilt.push(kind);
        }
        if !rebuilt.is_empty() {
            engine_debug!("laugh::RenderGraph", "Rebuilt passes {:?}", rebuilt);
        }
        Ok(rebuilt)
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, kind: PassKind, desc: RenderPassDesc) -> Result<()> {
        desc.validate()?;
        let handle = device.create_render_pass(&desc)?;
        self.passes.insert(kind, BuiltPass { handle, desc });
        Ok(())
    }

    pub fn handle(&self, kind: PassKind) -> Result<RenderPassHandle> {
        self.passes
            .get(&kind)
            .map(|p| p.handle)
            .ok_or_else(|| Error::InvalidResource(format!("render pass {} not built", kind.name())))
    }

    pub fn desc(&self, kind: PassKind) -> Result<&RenderPassDesc> {
        self.passes
            .get(&kind)
            .map(|p| &p.desc)
            .ok_or_else(|| Error::InvalidResource(format!("render pass {} not built", kind.name())))
    }

    /// Record the final layouts a completed pass left its registry attachments in
    pub fn apply_final_layouts(&self, kind: PassKind, registry: &mut ResourceRegistry) -> Result<()> {
        let desc = self.desc(kind)?;
        let targets: Vec<(AttachmentSlot, ImageLayout)> = match kind {
            // One pass, instantiated on both ping-pong buffers
            PassKind::BloomClear => [AttachmentSlot::PostEffect0, AttachmentSlot::PostEffect1]
                .iter()
                .map(|slot| (*slot, desc.attachments[0].final_layout))
                .collect(),
            _ => kind
                .attachment_slots()
                .iter()
                .copied()
                .zip(desc.attachments.iter().map(|a| a.final_layout))
                .collect(),
        };
        for (slot, layout) in targets {
            let id = registry.attachment_id(slot)?;
            registry.set_layout(id, layout)?;
        }
        Ok(())
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, pass) in self.passes.drain() {
            device.destroy_render_pass(pass.handle);
        }
    }
}

#[cfg(test)]
#[path = "pass_builder_tests.rs"]
mod tests;
