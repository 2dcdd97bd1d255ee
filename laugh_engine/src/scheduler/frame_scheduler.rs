/// Frame scheduler: queue submission and synchronization
///
/// Two phases:
/// - precompute: BRDF LUT on the compute queue and environment prefilter on
///   the graphics queue, each fenced and waited on, then the outputs moved to
///   `ShaderReadOnly` so steady descriptor sets can reference them
/// - steady: acquire, then three chained graphics submissions
///   (geometry+lighting -> post-effect -> present buffer) and a present, ordered
///   only by semaphores; the CPU never waits between them

use crate::assets::PrecomputePlan;
use crate::device::*;
use crate::error::Result;
use crate::registry::{PrecomputedSlot, ResourceRegistry};
use crate::render_graph::{PassKind, RenderPassGraph};
use crate::sequencer::{PrecomputeCommands, SteadyCommands};
use crate::{engine_debug, engine_info, engine_warn};

/// Result of one steady-state frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame reached the given swap chain image
    Presented(u32),
    /// The surface must be recreated; nothing more was presented after the report
    OutOfDate,
}

/// Semaphores chaining the per-frame submissions
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    pub image_available: SemaphoreHandle,
    pub geometry_lighting_done: SemaphoreHandle,
    pub post_effect_done: SemaphoreHandle,
    pub final_output_done: SemaphoreHandle,
}

impl FrameSync {
    fn create(device: &mut dyn GraphicsDevice) -> Result<Self> {
        Ok(Self {
            image_available: device.create_semaphore()?,
            geometry_lighting_done: device.create_semaphore()?,
            post_effect_done: device.create_semaphore()?,
            final_output_done: device.create_semaphore()?,
        })
    }

    fn destroy(self, device: &mut dyn GraphicsDevice) {
        for semaphore in [
            self.image_available,
            self.geometry_lighting_done,
            self.post_effect_done,
            self.final_output_done,
        ] {
            device.destroy_semaphore(semaphore);
        }
    }
}

pub struct FrameScheduler {
    sync: FrameSync,
    acquire_timeout_ns: u64,
    frames_presented: u64,
}

impl FrameScheduler {
    pub fn new(device: &mut dyn GraphicsDevice, acquire_timeout_ns: u64) -> Result<Self> {
        Ok(Self { sync: FrameSync::create(device)?, acquire_timeout_ns, frames_presented: 0 })
    }

    pub fn sync(&self) -> FrameSync {
        self.sync
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    // ===== PRECOMPUTE =====

    /// Submit the recorded precompute buffers, block until they retire, and make
    /// every computed map readable
    ///
    /// Returns the number of submissions issued.
    pub fn run_precompute(
        &self,
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        commands: &PrecomputeCommands,
        plan: &PrecomputePlan,
    ) -> Result<usize> {
        let mut pending = Vec::new();
        if let Some((command_buffer, queue)) = commands.brdf {
            pending.push(Self::submit_fenced(device, queue, command_buffer)?);
        }
        if let Some(command_buffer) = commands.prefilter {
            pending.push(Self::submit_fenced(device, QueueKind::Graphics, command_buffer)?);
        }

        let submissions = pending.len();
        for fence in pending {
            let waited = device.wait_for_fence(fence, u64::MAX);
            device.destroy_fence(fence);
            waited?;
        }

        for slot in plan.computed_slots() {
            // Layout the producing work left the image in
            let written = match slot {
                PrecomputedSlot::BrdfLut => ImageLayout::General,
                PrecomputedSlot::DiffuseIrradiance | PrecomputedSlot::SpecularIrradiance => {
                    ImageLayout::ColorAttachment
                }
            };
            let id = registry.precomputed_id(slot)?;
            registry.set_layout(id, written)?;
            registry.transition(device, id, ImageLayout::ShaderReadOnly)?;
        }

        if submissions > 0 {
            engine_info!("laugh::Scheduler", "Precomputation finished ({} submissions)", submissions);
        } else {
            engine_debug!("laugh::Scheduler", "Nothing to precompute");
        }
        Ok(submissions)
    }

    fn submit_fenced(
        device: &mut dyn GraphicsDevice,
        queue: QueueKind,
        command_buffer: CommandBufferHandle,
    ) -> Result<FenceHandle> {
        let fence = device.create_fence(false)?;
        let submitted = device.submit(&SubmitInfo {
            queue,
            command_buffers: vec![command_buffer],
            wait: Vec::new(),
            signal: Vec::new(),
            fence: Some(fence),
        });
        if let Err(e) = submitted {
            device.destroy_fence(fence);
            return Err(e);
        }
        Ok(fence)
    }

    // ===== STEADY STATE =====

    /// Acquire, submit the three steady buffers and present
    ///
    /// An out-of-date or suboptimal surface is reported as `FrameOutcome::OutOfDate`;
    /// every other failure is returned as an error.
    pub fn draw_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        graph: &RenderPassGraph,
        commands: &SteadyCommands,
    ) -> Result<FrameOutcome> {
        let sync = self.sync;
        let (image_index, suboptimal) = match device.acquire_next_image(sync.image_available, self.acquire_timeout_ns) {
            Ok(AcquireResult::Ready { image_index, suboptimal }) => (image_index, suboptimal),
            Ok(AcquireResult::OutOfDate) => {
                engine_warn!("laugh::Scheduler", "Swap chain out of date at acquire");
                return Ok(FrameOutcome::OutOfDate);
            }
            Err(e) if e.is_transient() => return Ok(FrameOutcome::OutOfDate),
            Err(e) => return Err(e),
        };

        let chain = [
            (commands.geometry_lighting()?, sync.image_available, sync.geometry_lighting_done),
            (commands.post_effect()?, sync.geometry_lighting_done, sync.post_effect_done),
            (commands.present(image_index)?, sync.post_effect_done, sync.final_output_done),
        ];
        for (command_buffer, wait, signal) in chain {
            device.submit(&SubmitInfo {
                queue: QueueKind::Graphics,
                command_buffers: vec![command_buffer],
                wait: vec![SemaphoreWait { semaphore: wait, stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT }],
                signal: vec![signal],
                fence: None,
            })?;
        }
        for pass in [PassKind::GeometryLighting, PassKind::BloomClear, PassKind::BloomMerge] {
            graph.apply_final_layouts(pass, registry)?;
        }

        let status = match device.present(image_index, sync.final_output_done) {
            Ok(status) => status,
            Err(e) if e.is_transient() => PresentStatus::OutOfDate,
            Err(e) => return Err(e),
        };
        if status != PresentStatus::OutOfDate {
            self.frames_presented += 1;
        }
        if suboptimal || status.needs_recreate() {
            engine_warn!("laugh::Scheduler", "Swap chain needs recreation ({:?})", status);
            return Ok(FrameOutcome::OutOfDate);
        }
        Ok(FrameOutcome::Presented(image_index))
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.sync.destroy(device);
    }
}

#[cfg(test)]
#[path = "frame_scheduler_tests.rs"]
mod tests;
