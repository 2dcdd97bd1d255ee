/// Deferred renderer: owns the device and drives every component through the
/// lifecycle
///
/// Creation order (reversed at teardown):
/// registry attachments, precomputed maps, scene, uniform buffer, render passes,
/// pipeline layouts, model sets, scheduler; then after precomputation the steady
/// pipelines, steady sets, framebuffers and command buffers.

use glam::Vec4;

use crate::assets::{prepare_precomputed, save_computed, AssetLoader, PrecomputePlan};
use crate::camera::Camera;
use crate::config::{DisplayMode, RendererConfig, UNIFORM_BLOB_SIZE};
use crate::device::*;
use crate::error::{Error, Result};
use crate::pipeline::{DescriptorSets, Pipelines, SetSources};
use crate::registry::{BufferId, ResourceRegistry};
use crate::render_graph::{PrefilterFramebuffers, RenderPassGraph, SteadyFramebuffers};
use crate::renderer::RenderLifecycle;
use crate::scene::{Scene, SceneDesc};
use crate::scheduler::{FrameOutcome, FrameScheduler};
use crate::sequencer::{PrecomputeCommands, RecordContext, SteadyCommands};
use crate::uniform_blob::{DisplayInfo, LightData, LightingParams, SharedUniforms, Transforms, UniformBlob};
use crate::{engine_debug, engine_info, engine_warn};

/// Everything created by `initialize`
struct Core {
    registry: ResourceRegistry,
    graph: RenderPassGraph,
    pipelines: Pipelines,
    sets: DescriptorSets,
    blob: UniformBlob,
    uniforms: SharedUniforms,
    uniform_buffer: BufferId,
    scene: Scene,
    scheduler: FrameScheduler,
    plan: PrecomputePlan,
    swapchain: SwapchainInfo,
    /// Present once precomputation finished
    steady: Option<SteadyState>,
}

/// Resolution-dependent per-frame state
struct SteadyState {
    framebuffers: SteadyFramebuffers,
    commands: SteadyCommands,
}

impl Core {
    fn uniform_buffer(&self) -> Result<BufferHandle> {
        Ok(self.registry.buffer(self.uniform_buffer)?.buffer)
    }

    fn record_context(&self) -> RecordContext<'_> {
        RecordContext {
            registry: &self.registry,
            graph: &self.graph,
            pipelines: &self.pipelines,
            sets: &self.sets,
            scene: &self.scene,
        }
    }
}

/// Descriptor sources built from individual `Core` fields
fn set_sources<'a>(
    registry: &'a ResourceRegistry,
    uniforms: &'a SharedUniforms,
    uniform_buffer: BufferId,
    scene: &Scene,
) -> Result<SetSources<'a>> {
    Ok(SetSources {
        registry,
        uniform_buffer: registry.buffer(uniform_buffer)?.buffer,
        uniforms,
        radiance: scene.skybox.radiance,
    })
}

pub struct DeferredRenderer<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    loader: Box<dyn AssetLoader>,
    scene_desc: SceneDesc,
    camera: Camera,
    display_mode: DisplayMode,
    core: Option<Core>,
    /// Last requested surface size (zero while minimized)
    surface_extent: (u32, u32),
    /// Swap chain recreation is waiting for the surface to regain an area
    surface_lost: bool,
}

impl<D: GraphicsDevice> DeferredRenderer<D> {
    pub fn new(device: D, config: RendererConfig, loader: Box<dyn AssetLoader>, scene_desc: SceneDesc) -> Self {
        let swapchain = device.swapchain_info();
        Self {
            camera: Camera::for_extent(swapchain.width, swapchain.height),
            display_mode: config.display_mode,
            surface_extent: (swapchain.width, swapchain.height),
            surface_lost: false,
            device,
            config,
            loader,
            scene_desc,
            core: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    /// Which precomputed maps are computed this run (empty before `initialize`)
    pub fn plan(&self) -> PrecomputePlan {
        self.core.as_ref().map(|core| core.plan).unwrap_or_default()
    }

    pub fn registry(&self) -> Option<&ResourceRegistry> {
        self.core.as_ref().map(|core| &core.registry)
    }

    pub fn frames_presented(&self) -> u64 {
        self.core.as_ref().map(|core| core.scheduler.frames_presented()).unwrap_or(0)
    }

    pub fn is_ready(&self) -> bool {
        self.core.as_ref().is_some_and(|core| core.steady.is_some())
    }

    /// Whether frames are skipped until the surface has an area again
    pub fn is_suspended(&self) -> bool {
        let (width, height) = self.surface_extent;
        self.surface_lost || width == 0 || height == 0
    }

    fn core_mut(core: &mut Option<Core>) -> Result<&mut Core> {
        core.as_mut()
            .ok_or_else(|| Error::InvalidResource("renderer not initialized".to_string()))
    }

    // ===== UNIFORMS =====

    /// Fill the blob from the camera, lights and display mode, then upload it once
    fn update_uniforms(&mut self) -> Result<()> {
        let Self { device, config, camera, display_mode, core, .. } = self;
        let core = Self::core_mut(core)?;

        let eye = camera.position;
        core.blob.write(
            core.uniforms.transforms,
            &Transforms::new(camera.view_matrix(), camera.projection_matrix(), eye),
        );
        core.blob.write(
            core.uniforms.lighting,
            &LightingParams { eye_position: Vec4::from((eye, 1.0)), lights: config.lights.map(LightData::from) },
        );
        core.blob.write(core.uniforms.display, &DisplayInfo::new(*display_mode, core.registry.extent()));
        core.scene.write_uniforms(&mut core.blob);

        let buffer = core.uniform_buffer()?;
        core.blob.upload(device, buffer)
    }

    // ===== STEADY STATE =====

    /// Steady pipelines, sets, framebuffers and command buffers
    fn build_steady(&mut self) -> Result<()> {
        let Self { device, config, loader, core, .. } = self;
        let core = Self::core_mut(core)?;

        let extent = core.registry.extent();
        core.pipelines.build_steady(device, loader.as_ref(), config, &core.graph, extent)?;
        let sources = set_sources(&core.registry, &core.uniforms, core.uniform_buffer, &core.scene)?;
        core.sets.create_steady(device, &core.pipelines, &sources)?;

        let framebuffers = SteadyFramebuffers::create(device, &core.registry, &core.graph, &core.swapchain)?;
        let mut commands = SteadyCommands::new();
        commands.record(device, &core.record_context(), &framebuffers, &core.swapchain, config.bloom_iterations)?;
        core.steady = Some(SteadyState { framebuffers, commands });

        engine_info!("laugh::Renderer", "Steady state ready at {}x{}", extent.0, extent.1);
        Ok(())
    }

    /// Recreate the swap chain and every resolution-dependent resource
    ///
    /// A surface without area leaves everything in place and marks the surface
    /// lost; the next frame after it regains an area retries.
    fn recreate_surface(&mut self) -> Result<()> {
        let (width, height) = self.surface_extent;
        if width == 0 || height == 0 {
            self.surface_lost = true;
            return Ok(());
        }
        let Self { device, config, loader, core, camera, surface_lost, .. } = self;
        let core = Self::core_mut(core)?;

        device.wait_idle()?;
        let swapchain = match device.recreate_swapchain(width, height) {
            Ok(swapchain) => swapchain,
            Err(e) if e.is_transient() => {
                engine_debug!("laugh::Renderer", "Surface has no area, frames suspended");
                *surface_lost = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        *surface_lost = false;

        let Some(mut steady) = core.steady.take() else {
            return Err(Error::InvalidResource("resize before the steady state exists".to_string()));
        };
        steady.framebuffers.destroy(device);

        core.swapchain = swapchain;
        let extent = (core.swapchain.width, core.swapchain.height);
        core.registry.resize(device, extent)?;
        core.graph.rebuild_changed(device, &core.registry, core.swapchain.format)?;
        core.pipelines.build_steady(device, loader.as_ref(), config, &core.graph, extent)?;

        let framebuffers = SteadyFramebuffers::create(device, &core.registry, &core.graph, &core.swapchain)?;
        let sources = set_sources(&core.registry, &core.uniforms, core.uniform_buffer, &core.scene)?;
        core.sets.rewrite_attachments(device, &sources)?;
        steady
            .commands
            .record(device, &core.record_context(), &framebuffers, &core.swapchain, config.bloom_iterations)?;
        core.steady = Some(SteadyState { framebuffers, commands: steady.commands });

        camera.set_extent(extent.0, extent.1);
        engine_info!("laugh::Renderer", "Surface recreated at {}x{}", extent.0, extent.1);
        Ok(())
    }
}

impl<D: GraphicsDevice> RenderLifecycle for DeferredRenderer<D> {
    fn initialize(&mut self) -> Result<()> {
        if self.core.is_some() {
            return Err(Error::InitializationFailed("renderer already initialized".to_string()));
        }
        let Self { device, config, loader, scene_desc, .. } = self;
        let loader = loader.as_ref();

        let swapchain = device.swapchain_info();
        let mut blob = UniformBlob::new(UNIFORM_BLOB_SIZE, device.limits().min_uniform_buffer_offset_alignment);
        let uniforms = SharedUniforms::allocate(&mut blob)?;

        let mut registry = ResourceRegistry::new();
        registry.create_attachments(device, (swapchain.width, swapchain.height))?;
        let plan = prepare_precomputed(device, &mut registry, loader, config)?;
        let mut scene = Scene::load(device, &mut registry, loader, &mut blob, scene_desc)?;
        let uniform_buffer = registry.create_buffer(
            device,
            "uniform_blob",
            BufferDesc { size: UNIFORM_BLOB_SIZE, usage: BufferUsage::UNIFORM, location: MemoryLocation::CpuToGpu },
        )?;

        let graph = RenderPassGraph::build(device, &registry, swapchain.format)?;
        let pipelines = Pipelines::create_layouts(device)?;
        let buffer = registry.buffer(uniform_buffer)?.buffer;
        scene.create_descriptor_sets(device, &pipelines, &registry, buffer, &uniforms)?;
        let scheduler = FrameScheduler::new(device, config.acquire_timeout_ns)?;

        engine_info!(
            "laugh::Renderer",
            "Initialized: {} models, {} registry images, {} bytes of uniforms",
            scene.models.len(),
            registry.image_count(),
            blob.used()
        );
        self.core = Some(Core {
            registry,
            graph,
            pipelines,
            sets: DescriptorSets::new(),
            blob,
            uniforms,
            uniform_buffer,
            scene,
            scheduler,
            plan,
            swapchain,
            steady: None,
        });
        Ok(())
    }

    fn precompute(&mut self) -> Result<()> {
        // Cube views and lights must be on the device before the prefilter runs
        self.update_uniforms()?;
        {
            let Self { device, config, loader, core, .. } = self;
            let core = Self::core_mut(core)?;
            let plan = core.plan;

            if plan.is_empty() {
                core.scheduler.run_precompute(device, &mut core.registry, &PrecomputeCommands::default(), &plan)?;
            } else {
                core.pipelines.build_precompute(device, loader.as_ref(), config, &core.graph, &plan)?;
                let sources = set_sources(&core.registry, &core.uniforms, core.uniform_buffer, &core.scene)?;
                core.sets.create_precompute(device, &core.pipelines, &sources, plan.compute_brdf, plan.needs_prefilter())?;

                let targets = if plan.needs_prefilter() {
                    Some(PrefilterFramebuffers::create(
                        device,
                        &core.registry,
                        &core.graph,
                        plan.compute_diffuse,
                        plan.compute_specular,
                    )?)
                } else {
                    None
                };
                let commands = PrecomputeCommands::record(device, &core.record_context(), plan.compute_brdf, targets.as_ref())?;
                let submitted = core.scheduler.run_precompute(device, &mut core.registry, &commands, &plan);

                commands.free(device);
                if let Some(targets) = targets {
                    targets.destroy(device);
                }
                core.sets.destroy_precompute(device);
                core.pipelines.destroy_precompute(device);
                submitted?;
            }
        }
        self.build_steady()
    }

    fn render_frame(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::InvalidResource("render_frame before precompute".to_string()));
        }
        if self.surface_lost {
            self.recreate_surface()?;
        }
        if self.is_suspended() {
            return Ok(());
        }
        self.update_uniforms()?;

        let outcome = {
            let Self { device, core, .. } = self;
            let core = Self::core_mut(core)?;
            let steady = core
                .steady
                .as_ref()
                .ok_or_else(|| Error::InvalidResource("steady state missing".to_string()))?;
            core.scheduler.draw_frame(device, &mut core.registry, &core.graph, &steady.commands)?
        };

        match outcome {
            FrameOutcome::Presented(image_index) => {
                engine_debug!("laugh::Renderer", "Presented swap chain image {}", image_index);
                Ok(())
            }
            FrameOutcome::OutOfDate => self.recreate_surface(),
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.surface_extent = (width, height);
        if width == 0 || height == 0 {
            engine_debug!("laugh::Renderer", "Surface minimized ({}x{}), frames suspended", width, height);
            return Ok(());
        }
        if !self.is_ready() {
            self.camera.set_extent(width, height);
            return Ok(());
        }
        self.recreate_surface()
    }

    fn teardown(&mut self) -> Result<()> {
        let Some(mut core) = self.core.take() else {
            return Ok(());
        };
        let device = &mut self.device;
        let idle = device.wait_idle();

        // Only maps whose precomputation completed are saved
        let saved = if idle.is_ok() && core.steady.is_some() && !core.plan.is_empty() {
            save_computed(device, &mut core.registry, self.loader.as_ref(), &self.config, &core.plan)
        } else {
            Ok(())
        };
        if let Err(e) = &saved {
            engine_warn!("laugh::Renderer", "Computed maps not saved: {}", e);
        }

        if let Some(mut steady) = core.steady.take() {
            steady.commands.free(device);
            steady.framebuffers.destroy(device);
        }
        core.scheduler.destroy(device);
        core.sets.destroy(device);
        core.scene.destroy(device);
        core.pipelines.destroy(device);
        core.graph.destroy(device);
        core.registry.destroy_all(device);

        engine_info!("laugh::Renderer", "Teardown complete");
        idle.and(saved)
    }
}

#[cfg(test)]
#[path = "deferred_renderer_tests.rs"]
mod tests;
