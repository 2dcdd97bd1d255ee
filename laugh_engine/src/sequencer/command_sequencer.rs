/// Command sequencer: records the fixed command buffers
///
/// Two families:
/// - one-shot precompute buffers (BRDF LUT dispatch, environment prefilter),
///   recorded once with `OneTimeSubmit`, submitted once, then freed
/// - steady buffers (geometry+lighting, bloom chain, one present buffer per
///   swap chain image), recorded with `SimultaneousUse` at startup and again
///   only after a resize
///
/// The command lists are built as plain data first so the recording order can
/// be checked without a device.

use crate::config::{BRDF_LUT_SIZE, BRDF_WORKGROUP_SIZE};
use crate::device::*;
use crate::error::{Error, Result};
use crate::pipeline::*;
use crate::registry::{PrecomputedSlot, ResourceRegistry};
use crate::render_graph::{BloomTarget, PassKind, PrefilterFramebuffers, PrefilterTarget, RenderPassGraph, SteadyFramebuffers};
use crate::scene::Scene;
use crate::engine_debug;

/// Everything recording reads
pub struct RecordContext<'a> {
    pub registry: &'a ResourceRegistry,
    pub graph: &'a RenderPassGraph,
    pub pipelines: &'a Pipelines,
    pub sets: &'a DescriptorSets,
    pub scene: &'a Scene,
}

impl RecordContext<'_> {
    fn bind(&self, kind: PipelineKind, role: SetRole) -> Result<Vec<Command>> {
        let bind_point = match kind {
            PipelineKind::BrdfLut => PipelineBindPoint::Compute,
            _ => PipelineBindPoint::Graphics,
        };
        Ok(vec![
            Command::BindPipeline { bind_point, pipeline: self.pipelines.pipeline(kind)? },
            Command::BindDescriptorSets {
                bind_point,
                layout: self.pipelines.layout(kind)?,
                first_set: 0,
                sets: vec![self.sets.get(role)?],
            },
        ])
    }

    fn push<T: bytemuck::Pod>(&self, kind: PipelineKind, value: &T) -> Result<Command> {
        Ok(Command::push_constants(self.pipelines.layout(kind)?, ShaderStage::FRAGMENT, value))
    }

    fn begin(&self, pass: PassKind, framebuffer: FramebufferHandle, extent: (u32, u32)) -> Result<Command> {
        Ok(Command::BeginRenderPass {
            render_pass: self.graph.handle(pass)?,
            framebuffer,
            render_area: Rect2D::full(extent.0, extent.1),
            clear_values: pass.clear_values(),
        })
    }

    /// Single full-screen triangle; the vertex shader derives positions from the index
    fn full_screen_pass(
        &self,
        pass: PassKind,
        framebuffer: FramebufferHandle,
        extent: (u32, u32),
        kind: PipelineKind,
        role: SetRole,
        push: Option<Command>,
    ) -> Result<Vec<Command>> {
        let mut commands = vec![self.begin(pass, framebuffer, extent)?];
        commands.extend(self.bind(kind, role)?);
        commands.extend(push);
        commands.push(Command::Draw { vertex_count: 3, instance_count: 1 });
        commands.push(Command::EndRenderPass);
        Ok(commands)
    }
}

// ============================================================================
// Command lists
// ============================================================================

/// BRDF LUT: move the output to `General`, then one dispatch over the table
pub fn brdf_lut_commands(ctx: &RecordContext) -> Result<Vec<Command>> {
    let lut = ctx.registry.precomputed(PrecomputedSlot::BrdfLut)?;
    let groups = BRDF_LUT_SIZE.div_ceil(BRDF_WORKGROUP_SIZE);

    let mut commands = vec![Command::PipelineBarrier {
        src_stage: PipelineStage::TOP_OF_PIPE,
        dst_stage: PipelineStage::COMPUTE_SHADER,
        images: vec![ImageBarrier {
            image: lut.image,
            range: lut.desc.full_range(),
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::General,
            src_access: Access::empty(),
            dst_access: Access::SHADER_WRITE,
        }],
    }];
    commands.extend(ctx.bind(PipelineKind::BrdfLut, SetRole::BrdfLut)?);
    commands.push(Command::Dispatch { x: groups, y: groups, z: 1 });
    Ok(commands)
}

/// Environment prefilter: one layered draw of the skybox mesh per target
///
/// Diffuse once, then specular per mip with roughness rising from 0 to 1.
pub fn prefilter_commands(ctx: &RecordContext, targets: &PrefilterFramebuffers) -> Result<Vec<Command>> {
    let mesh_draw = ctx.scene.skybox.mesh.draw_commands(ctx.registry)?;
    let mut commands = Vec::new();

    let level = |commands: &mut Vec<Command>, target: &PrefilterTarget, kind: PipelineKind, push: Option<Command>| -> Result<()> {
        commands.push(ctx.begin(PassKind::Prefilter, target.framebuffer, (target.size, target.size))?);
        commands.push(Command::SetViewport(Viewport::full(target.size, target.size)));
        commands.push(Command::SetScissor(Rect2D::full(target.size, target.size)));
        commands.extend(ctx.bind(kind, SetRole::Prefilter)?);
        commands.extend(push);
        commands.extend(mesh_draw.iter().cloned());
        commands.push(Command::EndRenderPass);
        Ok(())
    };

    if let Some(target) = &targets.diffuse {
        level(&mut commands, target, PipelineKind::DiffusePrefilter, None)?;
    }
    let levels = targets.specular.len();
    for (mip, target) in targets.specular.iter().enumerate() {
        let roughness = if levels > 1 { mip as f32 / (levels - 1) as f32 } else { 0.0 };
        let push = ctx.push(PipelineKind::SpecularPrefilter, &PrefilterPushConstants { roughness })?;
        level(&mut commands, target, PipelineKind::SpecularPrefilter, Some(push))?;
    }
    Ok(commands)
}

/// Geometry + lighting: skybox, opaque models, subpass switch, one lighting draw
pub fn geometry_lighting_commands(ctx: &RecordContext, framebuffers: &SteadyFramebuffers) -> Result<Vec<Command>> {
    let scene = ctx.scene;
    let mut commands = vec![ctx.begin(PassKind::GeometryLighting, framebuffers.geometry, framebuffers.extent)?];

    commands.extend(ctx.bind(PipelineKind::Skybox, SetRole::Skybox)?);
    commands.push(ctx.push(PipelineKind::Skybox, &scene.skybox.push_constants())?);
    commands.extend(scene.skybox.mesh.draw_commands(ctx.registry)?);

    commands.push(Command::BindPipeline {
        bind_point: PipelineBindPoint::Graphics,
        pipeline: ctx.pipelines.pipeline(PipelineKind::Geometry)?,
    });
    let geometry_layout = ctx.pipelines.layout(PipelineKind::Geometry)?;
    for model in &scene.models {
        commands.push(Command::BindDescriptorSets {
            bind_point: PipelineBindPoint::Graphics,
            layout: geometry_layout,
            first_set: 0,
            sets: vec![model.descriptor_set()?],
        });
        commands.push(ctx.push(PipelineKind::Geometry, &model.push_constants())?);
        commands.extend(model.mesh.draw_commands(ctx.registry)?);
    }

    commands.push(Command::NextSubpass);
    commands.extend(ctx.bind(PipelineKind::Lighting, SetRole::Lighting)?);
    let spec_mip_levels = ctx.registry.precomputed(PrecomputedSlot::SpecularIrradiance)?.desc.mip_levels;
    commands.push(ctx.push(PipelineKind::Lighting, &LightingPushConstants { spec_mip_levels })?);
    commands.push(Command::Draw { vertex_count: 3, instance_count: 1 });
    commands.push(Command::EndRenderPass);
    Ok(commands)
}

/// Bloom chain: brightness mask into post0, `iterations` horizontal + vertical
/// blurs ping-ponging post0 -> post1 -> post0, then an additive merge onto the
/// lighting result
pub fn post_effect_commands(
    ctx: &RecordContext,
    framebuffers: &SteadyFramebuffers,
    iterations: u32,
) -> Result<Vec<Command>> {
    let extent = framebuffers.extent;
    let mut commands = ctx.full_screen_pass(
        PassKind::BloomClear,
        framebuffers.bloom(BloomTarget::Post0),
        extent,
        PipelineKind::BloomBrightness,
        SetRole::BloomFromLighting,
        None,
    )?;

    for _ in 0..iterations {
        for (target, source, is_horizontal) in [
            (BloomTarget::Post1, SetRole::BloomFromPost0, 1),
            (BloomTarget::Post0, SetRole::BloomFromPost1, 0),
        ] {
            let push = ctx.push(PipelineKind::BloomBlur, &BlurPushConstants { is_horizontal })?;
            commands.extend(ctx.full_screen_pass(
                PassKind::BloomClear,
                framebuffers.bloom(target),
                extent,
                PipelineKind::BloomBlur,
                source,
                Some(push),
            )?);
        }
    }

    commands.extend(ctx.full_screen_pass(
        PassKind::BloomMerge,
        framebuffers.bloom(BloomTarget::Lighting),
        extent,
        PipelineKind::BloomMerge,
        SetRole::BloomFromPost0,
        None,
    )?);
    Ok(commands)
}

/// Final composition into one swap chain image
pub fn present_commands(
    ctx: &RecordContext,
    framebuffers: &SteadyFramebuffers,
    image_index: u32,
    swapchain_extent: (u32, u32),
) -> Result<Vec<Command>> {
    ctx.full_screen_pass(
        PassKind::Final,
        framebuffers.present(image_index)?,
        swapchain_extent,
        PipelineKind::Final,
        SetRole::Final,
        None,
    )
}

// ============================================================================
// Recording
// ============================================================================

fn record_buffer(
    device: &mut dyn GraphicsDevice,
    command_buffer: CommandBufferHandle,
    usage: CommandBufferUsage,
    commands: &[Command],
) -> Result<()> {
    device.begin_command_buffer(command_buffer, usage)?;
    record_all(device, command_buffer, commands)?;
    device.end_command_buffer(command_buffer)
}

/// One-shot precompute buffers
#[derive(Debug, Default)]
pub struct PrecomputeCommands {
    /// BRDF dispatch and the queue it was allocated for
    pub brdf: Option<(CommandBufferHandle, QueueKind)>,
    pub prefilter: Option<CommandBufferHandle>,
}

impl PrecomputeCommands {
    /// Record whichever precompute work is pending
    ///
    /// The BRDF dispatch goes to the compute queue when the device has one.
    pub fn record(
        device: &mut dyn GraphicsDevice,
        ctx: &RecordContext,
        compute_brdf: bool,
        prefilter: Option<&PrefilterFramebuffers>,
    ) -> Result<Self> {
        let mut recorded = Self::default();
        if compute_brdf {
            let queue = if device.limits().has_async_compute { QueueKind::Compute } else { QueueKind::Graphics };
            let commands = brdf_lut_commands(ctx)?;
            let command_buffer = device.allocate_command_buffer(queue)?;
            record_buffer(device, command_buffer, CommandBufferUsage::OneTimeSubmit, &commands)?;
            recorded.brdf = Some((command_buffer, queue));
        }
        if let Some(targets) = prefilter {
            let commands = prefilter_commands(ctx, targets)?;
            let command_buffer = device.allocate_command_buffer(QueueKind::Graphics)?;
            record_buffer(device, command_buffer, CommandBufferUsage::OneTimeSubmit, &commands)?;
            recorded.prefilter = Some(command_buffer);
        }
        engine_debug!(
            "laugh::Sequencer",
            "Recorded precompute buffers (brdf: {}, prefilter: {})",
            recorded.brdf.is_some(),
            recorded.prefilter.is_some()
        );
        Ok(recorded)
    }

    pub fn free(self, device: &mut dyn GraphicsDevice) {
        if let Some((command_buffer, _)) = self.brdf {
            device.free_command_buffer(command_buffer);
        }
        if let Some(command_buffer) = self.prefilter {
            device.free_command_buffer(command_buffer);
        }
    }
}

/// Steady per-frame buffers, recorded once and resubmitted every frame
#[derive(Debug, Default)]
pub struct SteadyCommands {
    pub geometry_lighting: Option<CommandBufferHandle>,
    pub post_effect: Option<CommandBufferHandle>,
    /// One per swap chain image
    pub present: Vec<CommandBufferHandle>,
}

impl SteadyCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)record every steady buffer, reusing the existing ones
    ///
    /// The device must be idle when re-recording.
    pub fn record(
        &mut self,
        device: &mut dyn GraphicsDevice,
        ctx: &RecordContext,
        framebuffers: &SteadyFramebuffers,
        swapchain: &SwapchainInfo,
        bloom_iterations: u32,
    ) -> Result<()> {
        let geometry = geometry_lighting_commands(ctx, framebuffers)?;
        let post = post_effect_commands(ctx, framebuffers, bloom_iterations)?;

        let geometry_cb = Self::reuse_or_allocate(device, &mut self.geometry_lighting)?;
        record_buffer(device, geometry_cb, CommandBufferUsage::SimultaneousUse, &geometry)?;
        let post_cb = Self::reuse_or_allocate(device, &mut self.post_effect)?;
        record_buffer(device, post_cb, CommandBufferUsage::SimultaneousUse, &post)?;

        let image_count = swapchain.image_count();
        while self.present.len() > image_count {
            if let Some(surplus) = self.present.pop() {
                device.free_command_buffer(surplus);
            }
        }
        while self.present.len() < image_count {
            self.present.push(device.allocate_command_buffer(QueueKind::Graphics)?);
        }
        for (index, command_buffer) in self.present.iter().enumerate() {
            let commands = present_commands(ctx, framebuffers, index as u32, (swapchain.width, swapchain.height))?;
            record_buffer(device, *command_buffer, CommandBufferUsage::SimultaneousUse, &commands)?;
        }

        engine_debug!(
            "laugh::Sequencer",
            "Recorded steady buffers: {} geometry, {} post-effect, {} present commands",
            geometry.len(),
            post.len(),
            image_count
        );
        Ok(())
    }

    fn reuse_or_allocate(device: &mut dyn GraphicsDevice, slot: &mut Option<CommandBufferHandle>) -> Result<CommandBufferHandle> {
        match slot {
            Some(command_buffer) => Ok(*command_buffer),
            None => {
                let command_buffer = device.allocate_command_buffer(QueueKind::Graphics)?;
                *slot = Some(command_buffer);
                Ok(command_buffer)
            }
        }
    }

    pub fn geometry_lighting(&self) -> Result<CommandBufferHandle> {
        self.geometry_lighting
            .ok_or_else(|| Error::InvalidResource("geometry+lighting buffer not recorded".to_string()))
    }

    pub fn post_effect(&self) -> Result<CommandBufferHandle> {
        self.post_effect
            .ok_or_else(|| Error::InvalidResource("post-effect buffer not recorded".to_string()))
    }

    pub fn present(&self, image_index: u32) -> Result<CommandBufferHandle> {
        self.present
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("no present buffer for swap chain image {}", image_index)))
    }

    pub fn free(&mut self, device: &mut dyn GraphicsDevice) {
        for command_buffer in self
            .geometry_lighting
            .take()
            .into_iter()
            .chain(self.post_effect.take())
            .chain(self.present.drain(..))
        {
            device.free_command_buffer(command_buffer);
        }
    }
}

#[cfg(test)]
#[path = "command_sequencer_tests.rs"]
mod tests;
