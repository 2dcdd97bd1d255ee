/// Pipelines of every pass, built against validated shader interfaces
///
/// Set layouts and pipeline layouts are created once for the renderer's
/// lifetime. Precompute pipelines exist only until precomputation is done.
/// Steady pipelines bake the viewport and are rebuilt whenever the output
/// resolution or one of their render passes changes.

use rustc_hash::FxHashMap;

use crate::assets::{AssetLoader, PrecomputePlan, Vertex};
use crate::config::{RendererConfig, NUM_LIGHTS};
use crate::device::*;
use crate::error::{Error, Result};
use crate::pipeline::descriptor_layouts::{set_layout_desc, SetLayoutKind};
use crate::pipeline::push_constants::*;
use crate::pipeline::shader_library::ShaderLibrary;
use crate::pipeline::shader_validation::{report_unused_layout_bindings, validate_shader_interface};
use crate::render_graph::{PassKind, RenderPassGraph};
use crate::{engine_bail, engine_debug};

/// Every pipeline of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    BrdfLut,
    DiffusePrefilter,
    SpecularPrefilter,
    Skybox,
    Geometry,
    Lighting,
    BloomBrightness,
    BloomBlur,
    BloomMerge,
    Final,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 10] = [
        PipelineKind::BrdfLut,
        PipelineKind::DiffusePrefilter,
        PipelineKind::SpecularPrefilter,
        PipelineKind::Skybox,
        PipelineKind::Geometry,
        PipelineKind::Lighting,
        PipelineKind::BloomBrightness,
        PipelineKind::BloomBlur,
        PipelineKind::BloomMerge,
        PipelineKind::Final,
    ];

    /// Pipelines rebuilt with the swap chain
    pub const STEADY: [PipelineKind; 7] = [
        PipelineKind::Skybox,
        PipelineKind::Geometry,
        PipelineKind::Lighting,
        PipelineKind::BloomBrightness,
        PipelineKind::BloomBlur,
        PipelineKind::BloomMerge,
        PipelineKind::Final,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::BrdfLut => "brdf_lut",
            PipelineKind::DiffusePrefilter => "diffuse_prefilter",
            PipelineKind::SpecularPrefilter => "specular_prefilter",
            PipelineKind::Skybox => "skybox",
            PipelineKind::Geometry => "geometry",
            PipelineKind::Lighting => "lighting",
            PipelineKind::BloomBrightness => "bloom_brightness",
            PipelineKind::BloomBlur => "bloom_blur",
            PipelineKind::BloomMerge => "bloom_merge",
            PipelineKind::Final => "final",
        }
    }

    pub fn set_layout(&self) -> SetLayoutKind {
        match self {
            PipelineKind::BrdfLut => SetLayoutKind::BrdfLut,
            PipelineKind::DiffusePrefilter | PipelineKind::SpecularPrefilter => SetLayoutKind::Prefilter,
            PipelineKind::Skybox => SetLayoutKind::Skybox,
            PipelineKind::Geometry => SetLayoutKind::Geometry,
            PipelineKind::Lighting => SetLayoutKind::Lighting,
            PipelineKind::BloomBrightness | PipelineKind::BloomBlur | PipelineKind::BloomMerge => SetLayoutKind::Bloom,
            PipelineKind::Final => SetLayoutKind::Final,
        }
    }

    /// Push constant range of the pipeline, if it takes any
    pub fn push_constants(&self) -> Option<PushConstantRange> {
        let size = match self {
            PipelineKind::SpecularPrefilter => push_size::<PrefilterPushConstants>(),
            PipelineKind::Skybox => push_size::<SkyboxPushConstants>(),
            PipelineKind::Geometry => push_size::<GeometryPushConstants>(),
            PipelineKind::Lighting => push_size::<LightingPushConstants>(),
            PipelineKind::BloomBlur => push_size::<BlurPushConstants>(),
            _ => return None,
        };
        Some(PushConstantRange { stages: ShaderStage::FRAGMENT, offset: 0, size })
    }

    /// Shader names, in stage order
    pub fn shaders(&self) -> &'static [&'static str] {
        match self {
            PipelineKind::BrdfLut => &["brdf_lut.comp"],
            PipelineKind::DiffusePrefilter => &["prefilter.vert", "prefilter.geom", "diffuse_prefilter.frag"],
            PipelineKind::SpecularPrefilter => &["prefilter.vert", "prefilter.geom", "specular_prefilter.frag"],
            PipelineKind::Skybox => &["skybox.vert", "skybox.frag"],
            PipelineKind::Geometry => &["geometry.vert", "geometry.frag"],
            PipelineKind::Lighting => &["fullscreen.vert", "lighting.frag"],
            PipelineKind::BloomBrightness => &["fullscreen.vert", "bloom_brightness.frag"],
            PipelineKind::BloomBlur => &["fullscreen.vert", "bloom_blur.frag"],
            PipelineKind::BloomMerge => &["fullscreen.vert", "bloom_merge.frag"],
            PipelineKind::Final => &["fullscreen.vert", "final.frag"],
        }
    }
}

// ============================================================================
// Fixed-function state per pipeline
// ============================================================================

struct GraphicsState {
    pass: PassKind,
    subpass: u32,
    vertex_input: bool,
    cull_mode: CullMode,
    depth: DepthState,
    color_blend: Vec<ColorBlendAttachment>,
    dynamic_viewport: bool,
    /// Specialization constants of the fragment stage
    specialization: Vec<SpecializationConstant>,
}

impl GraphicsState {
    fn full_screen(pass: PassKind, blend: ColorBlendAttachment) -> Self {
        Self {
            pass,
            subpass: 0,
            vertex_input: false,
            cull_mode: CullMode::None,
            depth: DepthState::DISABLED,
            color_blend: vec![blend],
            dynamic_viewport: false,
            specialization: Vec::new(),
        }
    }
}

fn graphics_state(kind: PipelineKind) -> Option<GraphicsState> {
    let gbuffers = vec![ColorBlendAttachment::OPAQUE; 3];
    let state = match kind {
        PipelineKind::BrdfLut => return None,
        // One layered draw per level at a varying size
        PipelineKind::DiffusePrefilter | PipelineKind::SpecularPrefilter => GraphicsState {
            pass: PassKind::Prefilter,
            subpass: 0,
            vertex_input: true,
            cull_mode: CullMode::None,
            depth: DepthState::DISABLED,
            color_blend: vec![ColorBlendAttachment::OPAQUE],
            dynamic_viewport: true,
            specialization: Vec::new(),
        },
        // Seen from inside, behind everything
        PipelineKind::Skybox => GraphicsState {
            pass: PassKind::GeometryLighting,
            subpass: 0,
            vertex_input: true,
            cull_mode: CullMode::None,
            depth: DepthState { test_enable: true, write_enable: false, compare_op: CompareOp::LessOrEqual },
            color_blend: gbuffers,
            dynamic_viewport: false,
            specialization: Vec::new(),
        },
        PipelineKind::Geometry => GraphicsState {
            pass: PassKind::GeometryLighting,
            subpass: 0,
            vertex_input: true,
            cull_mode: CullMode::Back,
            depth: DepthState { test_enable: true, write_enable: true, compare_op: CompareOp::Less },
            color_blend: gbuffers,
            dynamic_viewport: false,
            specialization: Vec::new(),
        },
        // Respects the geometry depth without rewriting it
        PipelineKind::Lighting => GraphicsState {
            subpass: 1,
            depth: DepthState { test_enable: true, write_enable: false, compare_op: CompareOp::LessOrEqual },
            specialization: vec![SpecializationConstant { constant_id: 0, value: NUM_LIGHTS as u32 }],
            ..GraphicsState::full_screen(PassKind::GeometryLighting, ColorBlendAttachment::OPAQUE)
        },
        PipelineKind::BloomBrightness | PipelineKind::BloomBlur => {
            GraphicsState::full_screen(PassKind::BloomClear, ColorBlendAttachment::OPAQUE)
        }
        PipelineKind::BloomMerge => GraphicsState::full_screen(PassKind::BloomMerge, ColorBlendAttachment::ADDITIVE),
        PipelineKind::Final => GraphicsState::full_screen(PassKind::Final, ColorBlendAttachment::OPAQUE),
    };
    Some(state)
}

// ============================================================================
// Pipelines
// ============================================================================

pub struct Pipelines {
    shaders: ShaderLibrary,
    set_layouts: FxHashMap<SetLayoutKind, (DescriptorSetLayoutHandle, DescriptorSetLayoutDesc)>,
    layouts: FxHashMap<PipelineKind, PipelineLayoutHandle>,
    pipelines: FxHashMap<PipelineKind, PipelineHandle>,
    steady_extent: Option<(u32, u32)>,
}

impl Pipelines {
    /// Create every descriptor set layout and pipeline layout
    pub fn create_layouts(device: &mut dyn GraphicsDevice) -> Result<Self> {
        let max_push = device.limits().max_push_constants_size;
        let mut set_layouts = FxHashMap::default();
        for kind in SetLayoutKind::ALL {
            let desc = set_layout_desc(kind);
            let handle = device.create_descriptor_set_layout(&desc)?;
            set_layouts.insert(kind, (handle, desc));
        }

        let mut layouts = FxHashMap::default();
        for kind in PipelineKind::ALL {
            let push_constant_ranges: Vec<PushConstantRange> = kind.push_constants().into_iter().collect();
            if let Some(range) = push_constant_ranges.iter().find(|r| r.offset + r.size > max_push) {
                engine_bail!(
                    "laugh::Pipelines",
                    "{}: push constants of {} bytes exceed the device limit of {}",
                    kind.name(),
                    range.size,
                    max_push
                );
            }
            let set_layout = set_layouts
                .get(&kind.set_layout())
                .map(|(handle, _)| *handle)
                .ok_or_else(|| Error::InvalidResource(format!("{}: set layout missing", kind.name())))?;
            let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
                set_layouts: vec![set_layout],
                push_constant_ranges,
            })?;
            layouts.insert(kind, layout);
        }

        Ok(Self {
            shaders: ShaderLibrary::new(),
            set_layouts,
            layouts,
            pipelines: FxHashMap::default(),
            steady_extent: None,
        })
    }

    // ===== BUILD =====

    /// Build the pipelines of the requested precomputation work
    pub fn build_precompute(
        &mut self,
        device: &mut dyn GraphicsDevice,
        loader: &dyn AssetLoader,
        config: &RendererConfig,
        graph: &RenderPassGraph,
        plan: &PrecomputePlan,
    ) -> Result<()> {
        let wanted = [
            (PipelineKind::BrdfLut, plan.compute_brdf),
            (PipelineKind::DiffusePrefilter, plan.compute_diffuse),
            (PipelineKind::SpecularPrefilter, plan.compute_specular),
        ];
        for (kind, needed) in wanted {
            if needed && !self.pipelines.contains_key(&kind) {
                self.build(device, loader, config, graph, kind, (0, 0))?;
            }
        }
        Ok(())
    }

    /// Precompute pipelines are never needed again once their outputs exist
    pub fn destroy_precompute(&mut self, device: &mut dyn GraphicsDevice) {
        for kind in [PipelineKind::BrdfLut, PipelineKind::DiffusePrefilter, PipelineKind::SpecularPrefilter] {
            if let Some(pipeline) = self.pipelines.remove(&kind) {
                device.destroy_pipeline(pipeline);
            }
        }
    }

    /// (Re)build every steady-state pipeline for `extent`
    pub fn build_steady(
        &mut self,
        device: &mut dyn GraphicsDevice,
        loader: &dyn AssetLoader,
        config: &RendererConfig,
        graph: &RenderPassGraph,
        extent: (u32, u32),
    ) -> Result<()> {
        for kind in PipelineKind::STEADY {
            if let Some(old) = self.pipelines.remove(&kind) {
                device.destroy_pipeline(old);
            }
        }
        for kind in PipelineKind::STEADY {
            self.build(device, loader, config, graph, kind, extent)?;
        }
        self.steady_extent = Some(extent);
        engine_debug!(
            "laugh::Pipelines",
            "Built {} steady pipelines at {}x{}",
            PipelineKind::STEADY.len(),
            extent.0,
            extent.1
        );
        Ok(())
    }

    fn build(
        &mut self,
        device: &mut dyn GraphicsDevice,
        loader: &dyn AssetLoader,
        config: &RendererConfig,
        graph: &RenderPassGraph,
        kind: PipelineKind,
        extent: (u32, u32),
    ) -> Result<()> {
        let layout = self.layout(kind)?;
        let set_layout = self.set_layout_entry(kind.set_layout())?.1.clone();
        let push_ranges: Vec<PushConstantRange> = kind.push_constants().into_iter().collect();

        // Load and validate every stage before creating anything
        let mut stages = Vec::new();
        let mut interfaces = Vec::new();
        for name in kind.shaders() {
            let (module, stage) = self.shaders.get_or_load(device, loader, config, name)?;
            let interface = device.shader_interface(module)?;
            validate_shader_interface(kind.name(), stage, &interface, &[&set_layout], &push_ranges)?;
            stages.push((module, stage));
            interfaces.push(interface);
        }
        let interfaces: Vec<&ShaderInterface> = interfaces.iter().collect();
        report_unused_layout_bindings(kind.name(), &[&set_layout], &interfaces);

        let pipeline = match graphics_state(kind) {
            None => {
                let (module, _) = stages
                    .first()
                    .copied()
                    .ok_or_else(|| Error::InvalidResource(format!("{}: no compute shader", kind.name())))?;
                device.create_compute_pipeline(&ComputePipelineDesc { name: kind.name().to_string(), module, layout })?
            }
            Some(state) => {
                let stages = stages
                    .into_iter()
                    .map(|(module, stage)| PipelineShaderStage {
                        module,
                        stage,
                        specialization: if stage == ShaderStage::FRAGMENT {
                            state.specialization.clone()
                        } else {
                            Vec::new()
                        },
                    })
                    .collect();
                device.create_graphics_pipeline(&GraphicsPipelineDesc {
                    name: kind.name().to_string(),
                    stages,
                    vertex_layout: state.vertex_input.then(Vertex::layout),
                    cull_mode: state.cull_mode,
                    front_face: FrontFace::CounterClockwise,
                    depth: state.depth,
                    color_blend: state.color_blend,
                    dynamic_viewport: state.dynamic_viewport,
                    extent,
                    layout,
                    render_pass: graph.handle(state.pass)?,
                    subpass: state.subpass,
                })?
            }
        };
        self.pipelines.insert(kind, pipeline);
        Ok(())
    }

    // ===== LOOKUP =====

    pub fn pipeline(&self, kind: PipelineKind) -> Result<PipelineHandle> {
        self.pipelines
            .get(&kind)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("pipeline {} not built", kind.name())))
    }

    pub fn contains(&self, kind: PipelineKind) -> bool {
        self.pipelines.contains_key(&kind)
    }

    pub fn layout(&self, kind: PipelineKind) -> Result<PipelineLayoutHandle> {
        self.layouts
            .get(&kind)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("pipeline layout {} missing", kind.name())))
    }

    pub fn set_layout(&self, kind: SetLayoutKind) -> Result<DescriptorSetLayoutHandle> {
        Ok(self.set_layout_entry(kind)?.0)
    }

    fn set_layout_entry(&self, kind: SetLayoutKind) -> Result<&(DescriptorSetLayoutHandle, DescriptorSetLayoutDesc)> {
        self.set_layouts
            .get(&kind)
            .ok_or_else(|| Error::InvalidResource(format!("set layout {:?} missing", kind)))
    }

    /// Extent baked into the steady pipelines
    pub fn steady_extent(&self) -> Option<(u32, u32)> {
        self.steady_extent
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, pipeline) in self.pipelines.drain() {
            device.destroy_pipeline(pipeline);
        }
        for (_, layout) in self.layouts.drain() {
            device.destroy_pipeline_layout(layout);
        }
        for (_, (layout, _)) in self.set_layouts.drain() {
            device.destroy_descriptor_set_layout(layout);
        }
        self.shaders.destroy(device);
        self.steady_extent = None;
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
